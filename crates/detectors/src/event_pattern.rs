//! Event-pattern detector: three independent sub-detectors over the same
//! call (spec §4.5.3) — liquidation cascade, whale window, volume spike.

use cascadeguard_core::{EventKind, EventSignal, LiquidationEvent, Symbol, TradeEvent, TradeSide};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::tiering::{whale_large_order_threshold, Tier, TierThresholds};

const WHALE_WINDOW_MIN_TRADES: usize = 20;
const SPIKE_WINDOW_S: i64 = 60;
const BASELINE_BAND_START_S: i64 = 60;
const BASELINE_BAND_END_S: i64 = 300;

/// Runs all three sub-detectors and returns whichever fired.
#[must_use]
pub fn detect(
    symbol: &Symbol,
    now: DateTime<Utc>,
    now_ms: i64,
    cascade_liquidations: &[LiquidationEvent],
    cascade_thresholds: TierThresholds,
    whale_window_trades: &[TradeEvent],
    whale_tier: Tier,
    whale_base_large_order_threshold: f64,
    volume_spike_band_trades: &[TradeEvent],
) -> Vec<EventSignal> {
    let mut signals = Vec::new();

    if let Some(sig) = liquidation_cascade(symbol, now, cascade_liquidations, cascade_thresholds) {
        signals.push(sig);
    }
    if let Some(sig) = whale_window(
        symbol,
        now,
        whale_window_trades,
        whale_tier,
        whale_base_large_order_threshold,
    ) {
        signals.push(sig);
    }
    if let Some(sig) = volume_spike(symbol, now, now_ms, volume_spike_band_trades) {
        signals.push(sig);
    }

    signals
}

fn liquidation_cascade(
    symbol: &Symbol,
    now: DateTime<Utc>,
    liquidations: &[LiquidationEvent],
    thresholds: TierThresholds,
) -> Option<EventSignal> {
    let total_volume: f64 = liquidations.iter().map(|e| e.vol).sum();
    if total_volume < thresholds.cascade_threshold {
        return None;
    }
    let ratio = if thresholds.cascade_threshold > 0.0 {
        total_volume / thresholds.cascade_threshold
    } else {
        0.0
    };
    let confidence = if ratio > 5.0 {
        95.0
    } else if ratio > 2.5 {
        85.0
    } else if ratio > 1.5 {
        75.0
    } else {
        65.0
    };

    let mut data = HashMap::new();
    data.insert("total_volume".to_string(), total_volume);
    data.insert("threshold_ratio".to_string(), ratio);
    data.insert("liquidation_count".to_string(), liquidations.len() as f64);

    Some(EventSignal {
        symbol: symbol.clone(),
        timestamp: now,
        confidence,
        kind: EventKind::LiquidationCascade,
        description: format!("liquidation cascade: {total_volume:.0} volume ({ratio:.1}x threshold)"),
        data,
    })
}

fn whale_window(
    symbol: &Symbol,
    now: DateTime<Utc>,
    trades: &[TradeEvent],
    tier: Tier,
    base_large_order_threshold: f64,
) -> Option<EventSignal> {
    if trades.len() < WHALE_WINDOW_MIN_TRADES {
        return None;
    }
    let large_threshold = whale_large_order_threshold(tier, base_large_order_threshold);
    let large_count = trades.iter().filter(|t| t.vol >= large_threshold).count();
    if large_count < 5 {
        return None;
    }

    let buy_volume: f64 = trades
        .iter()
        .filter(|t| t.side == TradeSide::Buy)
        .map(|t| t.vol)
        .sum();
    let total_volume: f64 = trades.iter().map(|t| t.vol).sum();
    let buy_ratio = if total_volume > 0.0 {
        buy_volume / total_volume
    } else {
        0.5
    };

    let kind = if buy_ratio >= 0.6 {
        EventKind::WhaleAccumulation
    } else if buy_ratio <= 0.4 {
        EventKind::WhaleDistribution
    } else {
        return None;
    };

    let dominant_ratio = if kind == EventKind::WhaleAccumulation {
        buy_ratio
    } else {
        1.0 - buy_ratio
    };
    let confidence = (50.0 + dominant_ratio * 40.0).min(99.0);

    let mut data = HashMap::new();
    data.insert("large_order_count".to_string(), large_count as f64);
    data.insert("buy_ratio".to_string(), buy_ratio);

    Some(EventSignal {
        symbol: symbol.clone(),
        timestamp: now,
        confidence,
        kind,
        description: format!("whale window: {large_count} large orders, buy ratio {buy_ratio:.2}"),
        data,
    })
}

fn volume_spike(
    symbol: &Symbol,
    now: DateTime<Utc>,
    now_ms: i64,
    band_trades: &[TradeEvent],
) -> Option<EventSignal> {
    let spike_cutoff = now_ms - SPIKE_WINDOW_S * 1000;
    let current: f64 = band_trades
        .iter()
        .filter(|t| t.timestamp_ms >= spike_cutoff)
        .map(|t| t.vol)
        .sum();

    let baseline_cutoff_start = now_ms - BASELINE_BAND_END_S * 1000;
    let baseline_cutoff_end = now_ms - BASELINE_BAND_START_S * 1000;
    let baseline_trades: Vec<&TradeEvent> = band_trades
        .iter()
        .filter(|t| t.timestamp_ms >= baseline_cutoff_start && t.timestamp_ms < baseline_cutoff_end)
        .collect();
    if baseline_trades.is_empty() {
        return None;
    }

    let baseline_volume: f64 = baseline_trades.iter().map(|t| t.vol).sum();
    let oldest_ts = baseline_trades
        .iter()
        .map(|t| t.timestamp_ms)
        .min()
        .unwrap_or(baseline_cutoff_start);
    let span_s = ((now_ms - SPIKE_WINDOW_S * 1000 - oldest_ts) as f64 / 60_000.0).max(1.0);
    let baseline_per_minute = baseline_volume / span_s;
    if baseline_per_minute <= 0.0 {
        return None;
    }

    let ratio = current / baseline_per_minute;
    if ratio < 3.0 {
        return None;
    }
    let confidence = (50.0 + ratio * 10.0).min(99.0);

    let mut data = HashMap::new();
    data.insert("current_volume".to_string(), current);
    data.insert("baseline_per_minute".to_string(), baseline_per_minute);
    data.insert("ratio".to_string(), ratio);

    Some(EventSignal {
        symbol: symbol.clone(),
        timestamp: now,
        confidence,
        kind: EventKind::VolumeSpike,
        description: format!("volume spike: {ratio:.1}x baseline"),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(side: TradeSide, vol: f64, timestamp_ms: i64) -> TradeEvent {
        TradeEvent {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            exchange: "binance".into(),
            price: 100.0,
            side,
            vol,
            timestamp_ms,
        }
    }

    fn thresholds() -> TierThresholds {
        TierThresholds {
            cascade_threshold: 100.0,
            absorption_threshold: 50.0,
        }
    }

    #[test]
    fn cascade_fires_with_confidence_bucket() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let liqs = vec![LiquidationEvent {
            symbol: sym.clone(),
            exchange: "binance".into(),
            price: 100.0,
            side: cascadeguard_core::LiquidationSide::Long,
            vol: 600.0,
            timestamp_ms: 0,
        }];
        let sig = liquidation_cascade(&sym, Utc::now(), &liqs, thresholds()).unwrap();
        assert_eq!(sig.confidence, 95.0);
    }

    #[test]
    fn whale_window_requires_minimum_trade_count() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let trades: Vec<TradeEvent> = (0..5).map(|i| trade(TradeSide::Buy, 100.0, i)).collect();
        assert!(whale_window(&sym, Utc::now(), &trades, Tier::One, 50.0).is_none());
    }

    #[test]
    fn whale_window_accumulation_when_buy_dominant() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let mut trades: Vec<TradeEvent> = (0..20).map(|i| trade(TradeSide::Buy, 5.0, i)).collect();
        for t in trades.iter_mut().take(6) {
            t.vol = 100.0;
        }
        let sig = whale_window(&sym, Utc::now(), &trades, Tier::One, 50.0).unwrap();
        assert_eq!(sig.kind, EventKind::WhaleAccumulation);
    }

    #[test]
    fn volume_spike_requires_baseline_data() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let trades = vec![trade(TradeSide::Buy, 1000.0, 300_000)];
        assert!(volume_spike(&sym, Utc::now(), 300_000, &trades).is_none());
    }

    #[test]
    fn volume_spike_fires_when_current_triples_baseline() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let now_ms: i64 = 400_000;
        let mut trades = vec![trade(TradeSide::Buy, 900.0, now_ms - 10_000)];
        // baseline band 60..300s ago: small constant volume
        trades.push(trade(TradeSide::Buy, 10.0, now_ms - 120_000));
        trades.push(trade(TradeSide::Buy, 10.0, now_ms - 200_000));
        let sig = volume_spike(&sym, Utc::now(), now_ms, &trades);
        assert!(sig.is_some());
    }
}
