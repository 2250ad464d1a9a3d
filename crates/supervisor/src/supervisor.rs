//! Process entry point: wires every crate into one running pipeline and
//! owns graceful shutdown (spec §4.12, §6 "Process").

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cascadeguard_alerts::{AlertQueue, TelegramSink};
use cascadeguard_buffers::{BufferManager, ContextBuffer};
use cascadeguard_core::{AppConfig, SystemMonotonicClock};
use cascadeguard_dashboard::{ApiServer, DashboardState};
use cascadeguard_fusion::{ConfidenceScorer, SignalValidator};
use cascadeguard_ingest::{RestPoller, StreamClient};
use cascadeguard_store::Store;
use tokio::sync::{mpsc, watch};

use crate::background::{alert_drain_loop, cleanup_loop, run_cleanup, stats_reporter_loop, subscription_loop, tracker_loop};
use crate::ingest::ingest_loop;
use crate::state::Shared;
use crate::wire::{configured_symbols, parse_signal_type, trades_channel};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct Supervisor {
    config: AppConfig,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Runs the pipeline until `Ctrl-C`, then drains in-flight work before
    /// returning.
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened or the dashboard
    /// server fails to bind.
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.config;

        let store = Arc::new(Store::connect(&config.storage.database_url).await?);
        restore_state(&store, &config).await?;

        let scorer = Arc::new(ConfidenceScorer::default());
        for record in store.load_confidence_state().await.unwrap_or_default() {
            if let Some(signal_type) = parse_signal_type(&record.signal_type) {
                let history: Vec<bool> = serde_json::from_str(&record.history_json).unwrap_or_default();
                scorer.restore(signal_type, record.win_rate, history);
            }
        }

        let buffers = Arc::new(BufferManager::new(
            config.buffers.max_liquidations,
            config.buffers.max_trades,
            config.buffers.max_baseline_hours,
        ));
        let context = Arc::new(ContextBuffer::new());
        let validator = Arc::new(SignalValidator::new(
            config.signals.min_confidence,
            config.signals.cooldown_minutes,
            config.signals.max_per_hour,
            config.signals.dedup_window_minutes,
        ));
        let alert_queue = Arc::new(AlertQueue::new(config.alerts.queue_capacity));

        let dashboard = Arc::new(DashboardState::new(config.dashboard.api_token.clone(), store.clone()));
        for coin in store.load_dashboard_coins().await.unwrap_or_default() {
            dashboard.add_coin(&coin.symbol);
            dashboard.toggle_coin(&coin.symbol, coin.active);
        }

        let chat_sink = if config.telegram.enabled {
            Some(Arc::new(TelegramSink::new(
                config.telegram.bot_token.clone(),
                config.telegram.chat_id.clone(),
                Duration::from_millis(config.alerts.min_send_gap_ms),
            )))
        } else {
            None
        };

        let symbols = configured_symbols(&config);
        let rest_poller = Arc::new(RestPoller::new(
            config.coinglass.api_key.clone(),
            symbols.iter().map(cascadeguard_core::Symbol::to_base).collect(),
            context.clone(),
        )?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (frame_tx, frame_rx) = mpsc::channel(1024);

        let stream_client = StreamClient::new(
            config.websocket.url.clone(),
            config.websocket.api_key.clone(),
            Duration::from_secs(config.websocket.heartbeat_interval_s),
        );
        let (stream_handle, stream_task) = stream_client.spawn(frame_tx, shutdown_rx.clone());

        let shared = Arc::new(Shared::new(
            config.clone(),
            store.clone(),
            buffers,
            context,
            scorer,
            validator,
            alert_queue,
            dashboard.clone(),
            chat_sink,
            Arc::new(SystemMonotonicClock::default()),
            stream_handle.clone(),
            rest_poller.clone(),
        ));

        subscribe_initial_channels(&stream_handle, &symbols).await;

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(ingest_loop(shared.clone(), frame_rx)));
        tasks.push(tokio::spawn(alert_drain_loop(shared.clone(), shutdown_rx.clone())));
        tasks.push(tokio::spawn(stats_reporter_loop(shared.clone(), shutdown_rx.clone())));
        tasks.push(tokio::spawn(cleanup_loop(shared.clone(), shutdown_rx.clone())));
        tasks.push(tokio::spawn(tracker_loop(shared.clone(), shutdown_rx.clone())));
        tasks.push(tokio::spawn(subscription_loop(shared.clone(), shutdown_rx.clone())));

        {
            let shutdown_rx = shutdown_rx.clone();
            let poller = rest_poller.clone();
            tasks.push(tokio::spawn(async move { poller.run(shutdown_rx).await }));
        }

        let dashboard_addr: SocketAddr = format!("{}:{}", config.dashboard.host, config.dashboard.port).parse()?;
        let dashboard_task = tokio::spawn(ApiServer::new(dashboard).serve(dashboard_addr));

        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown signal received, draining pipeline");
        let _ = shutdown_tx.send(true);

        for task in tasks {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
        }
        dashboard_task.abort();
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, stream_task).await;

        run_cleanup(&shared).await;
        tracing::info!("shutdown complete");
        Ok(())
    }
}

async fn subscribe_initial_channels(stream_handle: &cascadeguard_ingest::StreamHandle, symbols: &[cascadeguard_core::Symbol]) {
    let mut channels = vec!["liquidationOrders".to_string()];
    channels.extend(symbols.iter().map(trades_channel));
    if let Err(err) = stream_handle.subscribe(channels).await {
        tracing::warn!(error = %err, "failed to subscribe to initial channels");
    }
}

async fn restore_state(store: &Store, config: &AppConfig) -> anyhow::Result<()> {
    let cutoff_hours = config.buffers.baseline_prune_age_hours;
    if cutoff_hours > 0 {
        let _ = store.cleanup_old_baselines(Some(cutoff_hours)).await;
    }
    Ok(())
}
