//! Shared pipeline state handed to every background task and analysis
//! job (spec §4.12). Grounded on the `Arc`-of-shared-state pattern the
//! stream client uses internally for its connection handle.

use std::collections::HashMap;
use std::sync::Arc;

use cascadeguard_buffers::{BufferManager, ContextBuffer};
use cascadeguard_core::{AppConfig, MonotonicClock, Symbol, TrackedSignal};
use cascadeguard_dashboard::DashboardState;
use cascadeguard_fusion::{ConfidenceScorer, SignalValidator};
use cascadeguard_ingest::{RestPoller, StreamHandle};
use cascadeguard_store::Store;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};

use cascadeguard_alerts::{AlertQueue, TelegramSink};
use cascadeguard_core::TradingSignal;

/// A signal that opened a tracked position and is awaiting outcome.
pub struct PendingTracked {
    pub signal_id: i64,
    pub tracked: TrackedSignal,
}

/// Everything the ingest loop, analysis pipeline, and background tasks
/// share. One instance lives for the life of the process, `Arc`-wrapped.
pub struct Shared {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub buffers: Arc<BufferManager>,
    pub context: Arc<ContextBuffer>,
    pub scorer: Arc<ConfidenceScorer>,
    pub validator: Arc<SignalValidator>,
    pub alert_queue: Arc<AlertQueue<TradingSignal>>,
    pub dashboard: Arc<DashboardState>,
    pub chat_sink: Option<Arc<TelegramSink>>,
    pub clock: Arc<dyn MonotonicClock>,
    pub stream: StreamHandle,
    pub rest_poller: Arc<RestPoller>,
    analysis_locks: SyncMutex<HashMap<Symbol, Arc<AsyncMutex<i64>>>>,
    pub pending: SyncMutex<Vec<PendingTracked>>,
    pub semaphore: Arc<Semaphore>,
}

impl Shared {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: AppConfig,
        store: Arc<Store>,
        buffers: Arc<BufferManager>,
        context: Arc<ContextBuffer>,
        scorer: Arc<ConfidenceScorer>,
        validator: Arc<SignalValidator>,
        alert_queue: Arc<AlertQueue<TradingSignal>>,
        dashboard: Arc<DashboardState>,
        chat_sink: Option<Arc<TelegramSink>>,
        clock: Arc<dyn MonotonicClock>,
        stream: StreamHandle,
        rest_poller: Arc<RestPoller>,
    ) -> Self {
        let permits = config.monitoring.max_concurrent_analysis.max(1);
        Self {
            config,
            store,
            buffers,
            context,
            scorer,
            validator,
            alert_queue,
            dashboard,
            chat_sink,
            clock,
            stream,
            rest_poller,
            analysis_locks: SyncMutex::new(HashMap::new()),
            pending: SyncMutex::new(Vec::new()),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Returns (creating if needed) the per-symbol debounce/serialization
    /// lock. The guarded `i64` is the monotonic-ms timestamp of the last
    /// analysis run for this symbol, seeded far in the past so the first
    /// run is never debounced.
    pub fn symbol_lock(&self, symbol: &Symbol) -> Arc<AsyncMutex<i64>> {
        let mut locks = self.analysis_locks.lock();
        locks
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(i64::MIN)))
            .clone()
    }
}
