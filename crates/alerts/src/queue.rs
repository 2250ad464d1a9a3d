//! Bounded priority alert queue (spec §4.10 C11).
//!
//! Priority 1 is the most urgent, 3 the least; within a priority level
//! items drain in FIFO order. Draining is the Supervisor's job — this
//! queue only orders and retries.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;

const MIN_PRIORITY: u8 = 1;
const MAX_PRIORITY: u8 = 3;

/// An item pending delivery, carrying its own retry budget.
#[derive(Debug, Clone)]
pub struct QueuedAlert<T> {
    pub payload: T,
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

struct HeapEntry<T> {
    alert: QueuedAlert<T>,
    sequence: u64,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.alert.priority == other.alert.priority && self.sequence == other.sequence
    }
}
impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so lower priority number and
        // earlier sequence sort to the top.
        other
            .alert
            .priority
            .cmp(&self.alert.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueStats {
    pub total_queued: u64,
    pub total_retried: u64,
    pub total_failed: u64,
}

struct State<T> {
    heap: BinaryHeap<HeapEntry<T>>,
    next_sequence: u64,
    stats: QueueStats,
}

/// Thread-safe bounded priority queue for outbound alerts.
pub struct AlertQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Notify,
    not_full: Notify,
    capacity: usize,
}

impl<T: Send> AlertQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                heap: BinaryHeap::new(),
                next_sequence: 0,
                stats: QueueStats::default(),
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            capacity,
        }
    }

    /// Enqueues `payload`. Waits up to 1s for space if the queue is full;
    /// returns `false` if it is still full after the wait.
    pub async fn put(&self, payload: T, priority: u8, max_retries: u32) -> bool {
        let priority = priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
        loop {
            {
                let mut state = self.state.lock();
                if state.heap.len() < self.capacity {
                    let sequence = state.next_sequence;
                    state.next_sequence += 1;
                    state.heap.push(HeapEntry {
                        alert: QueuedAlert {
                            payload,
                            priority,
                            enqueued_at: Utc::now(),
                            retry_count: 0,
                            max_retries,
                        },
                        sequence,
                    });
                    state.stats.total_queued += 1;
                    drop(state);
                    self.not_empty.notify_one();
                    return true;
                }
            }
            if timeout(StdDuration::from_secs(1), self.not_full.notified())
                .await
                .is_err()
            {
                tracing::warn!("alert queue full, dropping put after 1s wait");
                return false;
            }
        }
    }

    /// Pops the highest-priority, oldest-enqueued item. Waits up to
    /// `wait` (or forever if `None`) for an item to arrive.
    pub async fn get(&self, wait: Option<StdDuration>) -> Option<QueuedAlert<T>> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(entry) = state.heap.pop() {
                    drop(state);
                    self.not_full.notify_one();
                    return Some(entry.alert);
                }
            }
            let notified = self.not_empty.notified();
            match wait {
                Some(d) => {
                    if timeout(d, notified).await.is_err() {
                        return None;
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Re-queues a failed delivery, demoting its priority by one (floor
    /// at `MAX_PRIORITY`). Drops and counts as failed once retries are
    /// exhausted.
    pub async fn retry(&self, mut alert: QueuedAlert<T>) -> bool {
        if alert.retry_count >= alert.max_retries {
            self.state.lock().stats.total_failed += 1;
            tracing::warn!(
                retries = alert.retry_count,
                "alert exceeded max retries, dropping"
            );
            return false;
        }
        alert.retry_count += 1;
        let demoted_priority = (alert.priority + 1).min(MAX_PRIORITY);
        self.state.lock().stats.total_retried += 1;
        self.put(alert.payload, demoted_priority, alert.max_retries).await
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn higher_priority_drains_first() {
        let queue: AlertQueue<&str> = AlertQueue::new(10);
        queue.put("low", 3, 3).await;
        queue.put("high", 1, 3).await;
        queue.put("medium", 2, 3).await;

        assert_eq!(queue.get(None).await.unwrap().payload, "high");
        assert_eq!(queue.get(None).await.unwrap().payload, "medium");
        assert_eq!(queue.get(None).await.unwrap().payload, "low");
    }

    #[tokio::test]
    async fn same_priority_drains_fifo() {
        let queue: AlertQueue<u32> = AlertQueue::new(10);
        queue.put(1, 2, 3).await;
        queue.put(2, 2, 3).await;
        queue.put(3, 2, 3).await;

        assert_eq!(queue.get(None).await.unwrap().payload, 1);
        assert_eq!(queue.get(None).await.unwrap().payload, 2);
        assert_eq!(queue.get(None).await.unwrap().payload, 3);
    }

    #[tokio::test]
    async fn get_times_out_when_empty() {
        let queue: AlertQueue<u32> = AlertQueue::new(10);
        let result = queue.get(Some(StdDuration::from_millis(20))).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn put_fails_after_one_second_wait_when_full() {
        let queue: AlertQueue<u32> = AlertQueue::new(1);
        assert!(queue.put(1, 2, 3).await);
        assert!(!queue.put(2, 2, 3).await);
    }

    #[tokio::test]
    async fn retry_demotes_priority_and_requeues() {
        let queue: AlertQueue<&str> = AlertQueue::new(10);
        queue.put("alert", 1, 2).await;
        let item = queue.get(None).await.unwrap();
        assert!(queue.retry(item).await);
        let requeued = queue.get(None).await.unwrap();
        assert_eq!(requeued.priority, 2);
        assert_eq!(requeued.retry_count, 1);
    }

    #[tokio::test]
    async fn retry_exhausted_drops_and_counts_failed() {
        let queue: AlertQueue<&str> = AlertQueue::new(10);
        let item = QueuedAlert {
            payload: "alert",
            priority: 3,
            enqueued_at: Utc::now(),
            retry_count: 3,
            max_retries: 3,
        };
        assert!(!queue.retry(item).await);
        assert_eq!(queue.stats().total_failed, 1);
    }

    #[tokio::test]
    async fn priority_demotion_floors_at_three() {
        let queue: AlertQueue<&str> = AlertQueue::new(10);
        let item = QueuedAlert {
            payload: "alert",
            priority: 3,
            enqueued_at: Utc::now(),
            retry_count: 0,
            max_retries: 2,
        };
        assert!(queue.retry(item).await);
        let requeued = queue.get(None).await.unwrap();
        assert_eq!(requeued.priority, 3);
    }
}
