//! The per-symbol detect -> fuse -> score -> validate -> filter -> track ->
//! publish pipeline (spec §4.12), run once per debounced analysis trigger.

use std::sync::Arc;

use cascadeguard_core::{BaselineContext, Symbol, TradingSignal};
use cascadeguard_detectors::{classify_tier, event_pattern, order_flow, stop_hunt, thresholds_for, whale_large_order_threshold};
use cascadeguard_dashboard::{OrderFlowSnapshot, SignalSummary};
use cascadeguard_fusion::{apply_context_filter, generator, FilterMode, FilterOutcome};
use chrono::Utc;

use crate::state::{PendingTracked, Shared};
use crate::wire::{direction_str, signal_type_str};

pub async fn run_analysis(shared: &Arc<Shared>, symbol: &Symbol, now_ms: i64) {
    let tier = classify_tier(symbol, &shared.config.monitoring.tier1_symbols, &shared.config.monitoring.tier2_symbols);
    let tier_thresholds = thresholds_for(tier, &shared.config.thresholds);
    let now = Utc::now();

    let cascade_liqs = shared.buffers.get_liquidations(symbol, now_ms, shared.config.signals.cascade_window_s, None);
    let absorption_trades = shared.buffers.get_trades(symbol, now_ms, shared.config.signals.absorption_window_s, None);
    let order_flow_trades = shared.buffers.get_trades(symbol, now_ms, shared.config.signals.order_flow_window_s, None);
    let whale_window_trades = order_flow_trades.clone();
    let spike_band_trades = shared.buffers.get_trades(symbol, now_ms, 300, None);

    let stop_hunt_signal = stop_hunt::detect(
        symbol,
        now,
        &cascade_liqs,
        &absorption_trades,
        tier_thresholds,
        shared.config.thresholds.absorption_min_order_usd,
    );

    let order_flow_signal = order_flow::detect(
        symbol,
        now,
        &order_flow_trades,
        shared.config.signals.order_flow_window_s,
        shared.config.thresholds.large_order_usd,
        tier_thresholds,
    );

    let whale_threshold = whale_large_order_threshold(tier, shared.config.thresholds.large_order_usd);
    let event_signals = event_pattern::detect(
        symbol,
        now,
        now_ms,
        &cascade_liqs,
        tier_thresholds,
        &whale_window_trades,
        tier,
        whale_threshold,
        &spike_band_trades,
    );

    if stop_hunt_signal.is_none() && order_flow_signal.is_none() && event_signals.is_empty() {
        return;
    }

    if !order_flow_trades.is_empty() {
        publish_order_flow_snapshot(shared, symbol, &order_flow_trades);
    }

    let baseline = shared.buffers.get_baseline(symbol, now_ms);
    let baseline_context = BaselineContext {
        avg_hourly_liq_volume: baseline.avg_hourly_liq_volume,
        avg_hourly_trade_volume: baseline.avg_hourly_trade_volume,
        current_liq_multiplier: baseline.current_liq_multiplier,
        current_trade_multiplier: baseline.current_trade_multiplier,
    };

    let Some(mut signal) = generator::fuse(
        symbol,
        now,
        stop_hunt_signal,
        order_flow_signal,
        event_signals,
        Some(baseline_context),
        shared.config.signals.min_generator_confidence,
    ) else {
        return;
    };

    signal.confidence = shared.scorer.score(&signal, tier_thresholds.absorption_threshold);

    if let Err(reason) = shared.validator.validate(&signal, now) {
        tracing::debug!(symbol = %symbol, ?reason, "signal rejected");
        return;
    }

    let assessment = shared.context.assess(&symbol.to_base(), signal.direction);
    let filter_mode = FilterMode::parse(&shared.config.analysis.context_filter_mode);
    signal = match apply_context_filter(signal, assessment, filter_mode, shared.config.analysis.context_adjustment_enabled) {
        FilterOutcome::Blocked => {
            tracing::debug!(symbol = %symbol, "signal blocked by context filter");
            return;
        }
        FilterOutcome::Passed(signal) => signal,
    };

    publish_and_persist(shared, signal).await;
}

fn publish_order_flow_snapshot(shared: &Arc<Shared>, symbol: &Symbol, trades: &[cascadeguard_core::TradeEvent]) {
    use cascadeguard_core::TradeSide;

    let buy_volume: f64 = trades.iter().filter(|t| t.side == TradeSide::Buy).map(|t| t.price * t.vol).sum();
    let sell_volume: f64 = trades.iter().filter(|t| t.side == TradeSide::Sell).map(|t| t.price * t.vol).sum();
    let total = buy_volume + sell_volume;
    let buy_ratio = if total > 0.0 { buy_volume / total } else { 0.5 };

    let pair = symbol.to_base().to_pair("USDT");
    shared.dashboard.update_order_flow(
        pair.as_str(),
        OrderFlowSnapshot {
            buy_volume,
            sell_volume,
            buy_ratio,
            net_delta: buy_volume - sell_volume,
            updated_at: Utc::now(),
        },
    );
}

async fn publish_and_persist(shared: &Arc<Shared>, signal: TradingSignal) {
    let pair = signal.symbol.to_base().to_pair("USDT");
    let pair_str = pair.as_str().to_string();

    shared.dashboard.record_signal(SignalSummary {
        symbol: pair_str.clone(),
        signal_type: signal_type_str(signal.signal_type).to_string(),
        direction: direction_str(signal.direction).to_string(),
        confidence: signal.confidence,
        created_at: signal.created_at,
    });

    let metadata_json = serde_json::to_string(&signal.metadata).unwrap_or_default();
    let tracked = cascadeguard_tracker::open(signal.clone(), signal.created_at, shared.config.signals.check_interval_seconds);

    let save_result = shared
        .store
        .save_signal(
            &pair_str,
            signal_type_str(signal.signal_type),
            direction_str(signal.direction),
            signal.confidence,
            tracked.as_ref().map(|t| t.entry_price),
            tracked.as_ref().map(|t| t.stop_loss),
            tracked.as_ref().map(|t| t.target_price),
            &metadata_json,
        )
        .await;

    let signal_id = match save_result {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(error = %err, "failed to persist signal");
            shared.dashboard.bump(|s| s.errors += 1);
            -1
        }
    };

    if signal_id >= 0 {
        if let Some(tracked) = tracked {
            shared.pending.lock().push(PendingTracked { signal_id, tracked });
        }
    }

    shared.dashboard.bump(|s| s.signals_generated += 1);

    if !shared.dashboard.is_coin_active(&pair_str) {
        return;
    }

    let priority = signal.priority;
    let max_retries = shared.config.alerts.max_retries;
    if !shared.alert_queue.put(signal, priority, max_retries).await {
        shared.dashboard.bump(|s| s.errors += 1);
    }
}
