//! Long-running loops that drain alerts, report stats, evaluate tracked
//! signals, persist learner/baseline state, and apply dashboard
//! subscription changes (spec §4.12). Each loop races its work against the
//! shared shutdown signal, following `cascadeguard_ingest::stream`'s
//! `tokio::select!` idiom.

use std::sync::Arc;
use std::time::Duration;

use cascadeguard_core::{Direction, Symbol};
use cascadeguard_dashboard::SubscriptionAction;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;

use crate::state::Shared;
use crate::wire::{signal_type_str, trades_channel};

pub async fn alert_drain_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            alert = shared.alert_queue.get(Some(Duration::from_secs(1))) => {
                let Some(alert) = alert else { continue };
                let text = cascadeguard_alerts::format(&alert.payload);
                let delivered = match &shared.chat_sink {
                    Some(sink) => sink.send_with_retry(&text).await.is_ok(),
                    None => true,
                };
                if delivered {
                    shared.dashboard.bump(|s| s.alerts_sent += 1);
                } else if !shared.alert_queue.retry(alert).await {
                    shared.dashboard.bump(|s| s.errors += 1);
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("alert drain loop shutting down");
                    return;
                }
            }
        }
    }
}

pub async fn stats_reporter_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = shared.dashboard.stats_snapshot();
                let queue_stats = shared.alert_queue.stats();
                tracing::info!(
                    messages_received = stats.messages_received,
                    signals_generated = stats.signals_generated,
                    alerts_sent = stats.alerts_sent,
                    errors = stats.errors,
                    queued = shared.alert_queue.len(),
                    queue_failed = queue_stats.total_failed,
                    "pipeline stats"
                );
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

pub async fn cleanup_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(3600));
    loop {
        tokio::select! {
            _ = ticker.tick() => run_cleanup(&shared).await,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

pub async fn run_cleanup(shared: &Arc<Shared>) {
    let now_ms = shared.clock.now_ms();
    shared.buffers.cleanup_old_data(now_ms, 7200);
    shared.buffers.update_hourly_baseline(now_ms);

    for symbol in shared.buffers.tracked_symbols() {
        let baseline = shared.buffers.get_baseline(&symbol, now_ms);
        if let Err(err) = shared
            .store
            .save_baseline(symbol.as_str(), baseline.avg_hourly_liq_volume, baseline.avg_hourly_trade_volume)
            .await
        {
            tracing::warn!(%symbol, error = %err, "failed to persist baseline");
        }
    }

    if let Err(err) = shared.store.cleanup_old_baselines(None).await {
        tracing::warn!(error = %err, "failed to prune old baselines");
    }

    persist_learner_state(shared).await;

    let coins: Vec<(String, bool)> = shared
        .dashboard
        .coins_snapshot()
        .into_iter()
        .map(|c| (c.symbol, c.active))
        .collect();
    if let Err(err) = shared.store.save_dashboard_coins(&coins).await {
        tracing::warn!(error = %err, "failed to persist dashboard coin list");
    }
}

async fn persist_learner_state(shared: &Arc<Shared>) {
    for (signal_type, win_rate, history) in shared.scorer.snapshot() {
        let history_json = serde_json::to_string(&history).unwrap_or_else(|_| "[]".to_string());
        if let Err(err) = shared
            .store
            .save_confidence_state(signal_type_str(signal_type), win_rate, &history_json)
            .await
        {
            tracing::warn!(signal_type = signal_type_str(signal_type), error = %err, "failed to persist learner state");
        }
    }
}

pub async fn tracker_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = ticker.tick() => run_tracker_pass(&shared).await,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

pub async fn run_tracker_pass(shared: &Arc<Shared>) {
    let pending = std::mem::take(&mut *shared.pending.lock());
    let mut still_pending = Vec::new();
    let now = Utc::now();
    let now_ms = shared.clock.now_ms();

    for item in pending {
        let symbol = item.tracked.signal.symbol.clone();
        let latest_price = shared
            .buffers
            .get_trades(&symbol, now_ms, 60, Some(1))
            .first()
            .map(|t| t.price);

        match cascadeguard_tracker::evaluate(&item.tracked, now, latest_price, shared.config.signals.check_interval_seconds) {
            Some((outcome, exit_price)) => {
                shared.scorer.record_result(item.tracked.signal.signal_type, outcome.is_win());
                let exit_price = exit_price.unwrap_or(item.tracked.entry_price);
                let pnl = pnl_percent(&item.tracked, exit_price);
                if let Err(err) = shared
                    .store
                    .update_signal_outcome(item.signal_id, outcome.as_str(), exit_price, pnl)
                    .await
                {
                    tracing::warn!(error = %err, "failed to persist signal outcome");
                }
            }
            None => still_pending.push(item),
        }
    }

    *shared.pending.lock() = still_pending;
}

fn pnl_percent(tracked: &cascadeguard_core::TrackedSignal, exit_price: f64) -> f64 {
    if tracked.entry_price == 0.0 {
        return 0.0;
    }
    let raw = (exit_price - tracked.entry_price) / tracked.entry_price * 100.0;
    match tracked.signal.direction {
        Direction::Short => -raw,
        Direction::Long | Direction::Neutral => raw,
    }
}

pub async fn subscription_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut drain_ticker = interval(Duration::from_secs(10));
    let mut discover_ticker = interval(Duration::from_secs(300));
    loop {
        tokio::select! {
            _ = drain_ticker.tick() => {
                for request in shared.dashboard.drain_subscriptions() {
                    apply_dashboard_subscription(&shared, request).await;
                }
            }
            _ = discover_ticker.tick() => promote_discovered_symbols(&shared).await,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn apply_dashboard_subscription(shared: &Arc<Shared>, request: cascadeguard_dashboard::SubscriptionRequest) {
    let Ok(symbol) = Symbol::parse(&request.symbol) else {
        tracing::warn!(symbol = %request.symbol, "ignoring subscription for unparsable symbol");
        return;
    };
    let channel = trades_channel(&symbol);
    match request.action {
        SubscriptionAction::Subscribe => {
            if let Err(err) = shared.stream.subscribe(vec![channel]).await {
                tracing::warn!(%symbol, error = %err, "failed to subscribe to trade channel");
                return;
            }
            shared.dashboard.add_coin(symbol.as_str());
            shared.rest_poller.update_symbols(vec![symbol.to_base()]);
        }
        SubscriptionAction::Unsubscribe => {
            if let Err(err) = shared.stream.unsubscribe(vec![channel]).await {
                tracing::warn!(%symbol, error = %err, "failed to unsubscribe from trade channel");
            }
            shared.dashboard.remove_coin(symbol.as_str());
        }
    }
}

/// Auto-subscribes to symbols that saw enough liquidation activity to be
/// worth tracking even though they weren't in the configured tier lists.
async fn promote_discovered_symbols(shared: &Arc<Shared>) {
    let now_ms = shared.clock.now_ms();
    let window_s = shared.config.analysis.discovered_symbol_window_s;
    let min_count = shared.config.analysis.discovered_symbol_liq_count;

    for symbol in shared.buffers.tracked_symbols() {
        let pair = symbol.to_base().to_pair("USDT");
        if shared.dashboard.is_coin_active(pair.as_str()) {
            continue;
        }
        let count = shared.buffers.get_liquidations(&symbol, now_ms, window_s, None).len();
        if count >= min_count {
            tracing::info!(%symbol, count, "promoting discovered symbol to active monitoring");
            apply_dashboard_subscription(
                shared,
                cascadeguard_dashboard::SubscriptionRequest {
                    action: SubscriptionAction::Subscribe,
                    symbol: pair.as_str().to_string(),
                },
            )
            .await;
        }
    }
}
