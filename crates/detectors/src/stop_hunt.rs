//! Stop-hunt cascade detector (spec §4.5.1).

use cascadeguard_core::{
    HuntDirection, LiquidationEvent, LiquidationSide, PriceZone, StopHuntSignal, Symbol, TradeEvent,
    TradeSide,
};
use chrono::{DateTime, Utc};

use crate::tiering::TierThresholds;

/// Detects a stop-hunt cascade from liquidations in the cascade window and
/// absorption in the absorption window. Both slices are expected to already
/// be time-windowed by the caller (buffer manager query).
#[must_use]
pub fn detect(
    symbol: &Symbol,
    now: DateTime<Utc>,
    cascade_liquidations: &[LiquidationEvent],
    absorption_trades: &[TradeEvent],
    thresholds: TierThresholds,
    absorption_min_order_usd: f64,
) -> Option<StopHuntSignal> {
    let total_volume: f64 = cascade_liquidations.iter().map(|e| e.vol).sum();
    if total_volume < thresholds.cascade_threshold {
        return None;
    }

    let long_volume: f64 = cascade_liquidations
        .iter()
        .filter(|e| e.side == LiquidationSide::Long)
        .map(|e| e.vol)
        .sum();
    let short_volume: f64 = cascade_liquidations
        .iter()
        .filter(|e| e.side == LiquidationSide::Short)
        .map(|e| e.vol)
        .sum();

    let (direction, directional_pct) = if total_volume == 0.0 {
        (HuntDirection::Unknown, 0.5)
    } else if long_volume >= short_volume {
        (HuntDirection::ShortHunt, long_volume / total_volume)
    } else {
        (HuntDirection::LongHunt, short_volume / total_volume)
    };

    let priced: Vec<f64> = cascade_liquidations
        .iter()
        .map(|e| e.price)
        .filter(|p| *p > 0.0)
        .collect();
    let price_zone = PriceZone {
        min: priced.iter().cloned().fold(f64::INFINITY, f64::min),
        max: priced.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    };
    let price_zone = if priced.is_empty() {
        PriceZone { min: 0.0, max: 0.0 }
    } else {
        price_zone
    };

    let absorption_side = match direction {
        HuntDirection::ShortHunt => TradeSide::Buy,
        HuntDirection::LongHunt => TradeSide::Sell,
        HuntDirection::Unknown => TradeSide::Buy,
    };
    let absorption_volume: f64 = absorption_trades
        .iter()
        .filter(|t| t.side == absorption_side && t.vol >= absorption_min_order_usd)
        .map(|t| t.vol)
        .sum();
    let absorption_detected = absorption_volume >= thresholds.absorption_threshold;

    let confidence = score_confidence(
        total_volume,
        thresholds.cascade_threshold,
        absorption_volume,
        directional_pct,
        cascade_liquidations.len(),
    );

    Some(StopHuntSignal {
        symbol: symbol.clone(),
        timestamp: now,
        confidence,
        total_volume,
        liquidation_count: cascade_liquidations.len(),
        direction,
        directional_pct,
        price_zone,
        absorption_volume,
        absorption_detected,
    })
}

fn score_confidence(
    total_volume: f64,
    threshold: f64,
    absorption_volume: f64,
    directional_pct: f64,
    count: usize,
) -> f64 {
    let mut confidence: f64 = 50.0;

    let ratio = if threshold > 0.0 {
        total_volume / threshold
    } else {
        0.0
    };
    confidence += if ratio > 5.0 {
        25.0
    } else if ratio > 2.5 {
        20.0
    } else if ratio > 1.5 {
        15.0
    } else if ratio >= 1.0 {
        10.0
    } else {
        0.0
    };

    let absorption_pct = if total_volume > 0.0 {
        absorption_volume / total_volume
    } else {
        0.0
    };
    confidence += if absorption_pct > 0.30 {
        25.0
    } else if absorption_pct > 0.20 {
        20.0
    } else if absorption_pct > 0.10 {
        15.0
    } else if absorption_pct > 0.05 {
        10.0
    } else {
        0.0
    };

    confidence += if directional_pct > 0.9 {
        15.0
    } else if directional_pct > 0.8 {
        12.0
    } else if directional_pct > 0.7 {
        8.0
    } else {
        0.0
    };

    confidence += if count > 100 {
        5.0
    } else if count > 50 {
        3.0
    } else {
        0.0
    };

    confidence.min(99.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn liq(side: LiquidationSide, price: f64, vol: f64) -> LiquidationEvent {
        LiquidationEvent {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            exchange: "binance".into(),
            price,
            side,
            vol,
            timestamp_ms: 0,
        }
    }

    fn trade(side: TradeSide, vol: f64) -> TradeEvent {
        TradeEvent {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            exchange: "binance".into(),
            price: 100.0,
            side,
            vol,
            timestamp_ms: 0,
        }
    }

    fn thresholds() -> TierThresholds {
        TierThresholds {
            cascade_threshold: 100.0,
            absorption_threshold: 50.0,
        }
    }

    #[test]
    fn below_cascade_threshold_emits_nothing() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let liqs = vec![liq(LiquidationSide::Long, 100.0, 10.0)];
        let result = detect(&sym, Utc::now(), &liqs, &[], thresholds(), 5.0);
        assert!(result.is_none());
    }

    #[test]
    fn dominant_long_liquidations_classify_as_short_hunt() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let liqs = vec![
            liq(LiquidationSide::Long, 100.0, 80.0),
            liq(LiquidationSide::Short, 100.0, 20.0),
        ];
        let signal = detect(&sym, Utc::now(), &liqs, &[], thresholds(), 5.0).unwrap();
        assert_eq!(signal.direction, HuntDirection::ShortHunt);
        assert!((signal.directional_pct - 0.8).abs() < 1e-9);
    }

    #[test]
    fn absorption_detected_when_matching_side_exceeds_threshold() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let liqs = vec![liq(LiquidationSide::Long, 100.0, 100.0)];
        let trades = vec![trade(TradeSide::Buy, 60.0)];
        let signal = detect(&sym, Utc::now(), &liqs, &trades, thresholds(), 5.0).unwrap();
        assert!(signal.absorption_detected);
    }

    #[test]
    fn small_trades_below_min_order_are_excluded_from_absorption() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let liqs = vec![liq(LiquidationSide::Long, 100.0, 100.0)];
        let trades = vec![trade(TradeSide::Buy, 4.0)];
        let signal = detect(&sym, Utc::now(), &liqs, &trades, thresholds(), 5.0).unwrap();
        assert_eq!(signal.absorption_volume, 0.0);
    }

    #[test]
    fn zero_volume_is_unknown_direction() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let thresholds = TierThresholds {
            cascade_threshold: 0.0,
            absorption_threshold: 0.0,
        };
        let signal = detect(&sym, Utc::now(), &[], &[], thresholds, 5.0).unwrap();
        assert_eq!(signal.direction, HuntDirection::Unknown);
        assert_eq!(signal.directional_pct, 0.5);
    }

    #[test]
    fn confidence_caps_at_99() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let liqs: Vec<LiquidationEvent> = (0..150)
            .map(|_| liq(LiquidationSide::Long, 100.0, 1000.0))
            .collect();
        let trades = vec![trade(TradeSide::Buy, 100_000.0)];
        let signal = detect(&sym, Utc::now(), &liqs, &trades, thresholds(), 5.0).unwrap();
        assert_eq!(signal.confidence, 99.0);
    }
}
