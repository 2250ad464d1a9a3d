//! Mutex-protected snapshot state behind the dashboard bridge (spec §4.11
//! C12): stats counters, coin list, recent signals, and per-symbol order
//! flow. Readers always get a deep copy; writers never hold the lock while
//! touching the network.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use cascadeguard_core::Symbol;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

const MAX_RECENT_SIGNALS: usize = 200;
const RATE_LIMIT_PER_MINUTE: usize = 30;
const RATE_LIMIT_WINDOW_SECS: u64 = 60;
const RATE_LIMITER_MAX_IPS: usize = 10_000;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub messages_received: u64,
    pub messages_processed: u64,
    pub liquidations_processed: u64,
    pub trades_processed: u64,
    pub signals_generated: u64,
    pub alerts_sent: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinEntry {
    pub symbol: String,
    pub active: bool,
    pub added_at: DateTime<Utc>,
    pub flow: Option<OrderFlowSnapshot>,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderFlowSnapshot {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_ratio: f64,
    pub net_delta: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalSummary {
    pub symbol: String,
    pub signal_type: String,
    pub direction: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    #[serde(rename = "stats_update")]
    StatsUpdate { stats: Stats },
    #[serde(rename = "new_signal")]
    NewSignal { signal: SignalSummary },
    #[serde(rename = "order_flow_update")]
    OrderFlowUpdate { symbol: String, flow: OrderFlowSnapshot },
    #[serde(rename = "coin_added")]
    CoinAdded { symbol: String },
    #[serde(rename = "coin_removed")]
    CoinRemoved { symbol: String },
    #[serde(rename = "coin_toggled")]
    CoinToggled { symbol: String, active: bool },
}

#[derive(Debug, Clone, serde::Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Clone, serde::Deserialize, Serialize)]
pub struct SubscriptionRequest {
    pub action: SubscriptionAction,
    pub symbol: String,
}

struct Snapshot {
    stats: Stats,
    coins: HashMap<String, CoinEntry>,
    signals: VecDeque<SignalSummary>,
    order_flow: HashMap<String, OrderFlowSnapshot>,
}

/// Per-IP sliding-window rate limiter with LRU eviction above
/// [`RATE_LIMITER_MAX_IPS`] tracked addresses.
struct RateLimiter {
    hits: HashMap<IpAddr, (VecDeque<Instant>, Instant)>,
}

impl RateLimiter {
    fn new() -> Self {
        Self { hits: HashMap::new() }
    }

    fn check(&mut self, ip: IpAddr) -> bool {
        let now = Instant::now();
        if !self.hits.contains_key(&ip) && self.hits.len() >= RATE_LIMITER_MAX_IPS {
            if let Some(oldest) = self.hits.iter().min_by_key(|(_, (_, seen))| *seen).map(|(k, _)| *k) {
                self.hits.remove(&oldest);
            }
        }
        let entry = self.hits.entry(ip).or_insert_with(|| (VecDeque::new(), now));
        entry.1 = now;
        entry.0.retain(|t| now.duration_since(*t).as_secs() < RATE_LIMIT_WINDOW_SECS);
        if entry.0.len() >= RATE_LIMIT_PER_MINUTE {
            return false;
        }
        entry.0.push_back(now);
        true
    }
}

pub struct DashboardState {
    snapshot: Mutex<Snapshot>,
    rate_limiter: Mutex<RateLimiter>,
    pub subscription_queue: Mutex<VecDeque<SubscriptionRequest>>,
    pub events: broadcast::Sender<DashboardEvent>,
    pub api_token: String,
    pub store: Arc<cascadeguard_store::Store>,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    #[must_use]
    pub fn new(api_token: String, store: Arc<cascadeguard_store::Store>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            snapshot: Mutex::new(Snapshot {
                stats: Stats::default(),
                coins: HashMap::new(),
                signals: VecDeque::new(),
                order_flow: HashMap::new(),
            }),
            rate_limiter: Mutex::new(RateLimiter::new()),
            subscription_queue: Mutex::new(VecDeque::new()),
            events,
            api_token,
            store,
            started_at: Utc::now(),
        }
    }

    /// Placeholder token disables auth (spec §6: "warn at startup").
    #[must_use]
    pub fn auth_disabled(&self) -> bool {
        self.api_token.is_empty() || self.api_token == "CHANGE_ME"
    }

    /// Constant-time bearer token comparison.
    #[must_use]
    pub fn check_token(&self, presented: &str) -> bool {
        if self.auth_disabled() {
            return true;
        }
        let expected = self.api_token.as_bytes();
        let actual = presented.as_bytes();
        if expected.len() != actual.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in expected.iter().zip(actual.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }

    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        self.rate_limiter.lock().check(ip)
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    pub fn stats_snapshot(&self) -> Stats {
        self.snapshot.lock().stats.clone()
    }

    pub fn bump(&self, f: impl FnOnce(&mut Stats)) {
        let stats = {
            let mut guard = self.snapshot.lock();
            f(&mut guard.stats);
            guard.stats.clone()
        };
        let _ = self.events.send(DashboardEvent::StatsUpdate { stats });
    }

    pub fn coins_snapshot(&self) -> Vec<CoinEntry> {
        let mut coins: Vec<_> = self.snapshot.lock().coins.values().cloned().collect();
        coins.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        coins
    }

    pub fn add_coin(&self, raw_symbol: &str) -> Option<String> {
        let symbol = Symbol::parse(raw_symbol).ok()?.to_base().to_pair("USDT");
        let key = symbol.as_str().to_string();
        let mut guard = self.snapshot.lock();
        guard.coins.entry(key.clone()).or_insert_with(|| CoinEntry {
            symbol: key.clone(),
            active: true,
            added_at: Utc::now(),
            flow: None,
            last_update: None,
        });
        drop(guard);
        let _ = self.events.send(DashboardEvent::CoinAdded { symbol: key.clone() });
        Some(key)
    }

    pub fn remove_coin(&self, symbol: &str) -> bool {
        let removed = self.snapshot.lock().coins.remove(symbol).is_some();
        if removed {
            let _ = self.events.send(DashboardEvent::CoinRemoved { symbol: symbol.to_string() });
        }
        removed
    }

    pub fn toggle_coin(&self, symbol: &str, active: bool) -> bool {
        let found = {
            let mut guard = self.snapshot.lock();
            if let Some(coin) = guard.coins.get_mut(symbol) {
                coin.active = active;
                true
            } else {
                false
            }
        };
        if found {
            let _ = self
                .events
                .send(DashboardEvent::CoinToggled { symbol: symbol.to_string(), active });
        }
        found
    }

    pub fn is_coin_active(&self, symbol: &str) -> bool {
        self.snapshot.lock().coins.get(symbol).is_some_and(|c| c.active)
    }

    pub fn record_signal(&self, summary: SignalSummary) {
        let mut guard = self.snapshot.lock();
        if guard.signals.len() >= MAX_RECENT_SIGNALS {
            guard.signals.pop_front();
        }
        guard.signals.push_back(summary.clone());
        drop(guard);
        let _ = self.events.send(DashboardEvent::NewSignal { signal: summary });
    }

    pub fn recent_signals(&self, limit: usize) -> Vec<SignalSummary> {
        let guard = self.snapshot.lock();
        guard.signals.iter().rev().take(limit).cloned().collect()
    }

    pub fn update_order_flow(&self, symbol: &str, flow: OrderFlowSnapshot) {
        let mut guard = self.snapshot.lock();
        guard.order_flow.insert(symbol.to_string(), flow.clone());
        if let Some(coin) = guard.coins.get_mut(symbol) {
            coin.flow = Some(flow.clone());
            coin.last_update = Some(flow.updated_at);
        }
        drop(guard);
        let _ = self
            .events
            .send(DashboardEvent::OrderFlowUpdate { symbol: symbol.to_string(), flow });
    }

    pub fn order_flow(&self, symbol: &str) -> Option<OrderFlowSnapshot> {
        self.snapshot.lock().order_flow.get(symbol).cloned()
    }

    pub fn enqueue_subscription(&self, request: SubscriptionRequest) {
        self.subscription_queue.lock().push_back(request);
    }

    pub fn drain_subscriptions(&self) -> Vec<SubscriptionRequest> {
        self.subscription_queue.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_token_disables_auth() {
        let store = Arc::new(cascadeguard_store::Store::connect(":memory:").await.unwrap());
        let state = DashboardState::new(String::new(), store);
        assert!(state.check_token("anything"));
    }

    #[tokio::test]
    async fn token_check_matches_exact_value() {
        let store = Arc::new(cascadeguard_store::Store::connect(":memory:").await.unwrap());
        let state = DashboardState::new("secret-token".to_string(), store);
        assert!(state.check_token("secret-token"));
        assert!(!state.check_token("wrong-token"));
        assert!(!state.check_token("secret-tokenX"));
    }

    #[tokio::test]
    async fn placeholder_token_disables_auth() {
        let store = Arc::new(cascadeguard_store::Store::connect(":memory:").await.unwrap());
        let state = DashboardState::new("CHANGE_ME".to_string(), store);
        assert!(state.check_token("anything"));
    }

    #[tokio::test]
    async fn add_coin_normalizes_to_usdt_pair() {
        let store = Arc::new(cascadeguard_store::Store::connect(":memory:").await.unwrap());
        let state = DashboardState::new(String::new(), store);
        let added = state.add_coin("ETHBUSD").unwrap();
        assert_eq!(added, "ETHUSDT");
    }

    #[tokio::test]
    async fn recent_signals_caps_at_200_and_returns_newest_first() {
        let store = Arc::new(cascadeguard_store::Store::connect(":memory:").await.unwrap());
        let state = DashboardState::new(String::new(), store);
        for i in 0..205 {
            state.record_signal(SignalSummary {
                symbol: "BTCUSDT".into(),
                signal_type: "stop_hunt".into(),
                direction: "long".into(),
                confidence: f64::from(i),
                created_at: Utc::now(),
            });
        }
        let recent = state.recent_signals(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].confidence, 204.0);
    }
}
