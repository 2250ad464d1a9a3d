//! Order-flow accumulation/distribution analyzer (spec §4.5.2).

use cascadeguard_core::{FlowType, OrderFlowSignal, Symbol, TradeEvent, TradeSide};
use chrono::{DateTime, Utc};

use crate::tiering::TierThresholds;

const MIN_TRADES: usize = 10;

/// `window_s` is recorded on the output signal for downstream consumers; the
/// caller is responsible for having already windowed `trades`.
#[must_use]
pub fn detect(
    symbol: &Symbol,
    now: DateTime<Utc>,
    trades: &[TradeEvent],
    window_s: u64,
    large_order_threshold: f64,
    tier_thresholds: TierThresholds,
) -> Option<OrderFlowSignal> {
    if trades.len() < MIN_TRADES {
        return None;
    }

    let buy_volume: f64 = trades
        .iter()
        .filter(|t| t.side == TradeSide::Buy)
        .map(|t| t.vol)
        .sum();
    let sell_volume: f64 = trades
        .iter()
        .filter(|t| t.side == TradeSide::Sell)
        .map(|t| t.vol)
        .sum();
    let total_volume = buy_volume + sell_volume;
    let buy_ratio = if total_volume > 0.0 {
        buy_volume / total_volume
    } else {
        0.5
    };

    let large_buys = trades
        .iter()
        .filter(|t| t.side == TradeSide::Buy && t.vol >= large_order_threshold)
        .count();
    let large_sells = trades
        .iter()
        .filter(|t| t.side == TradeSide::Sell && t.vol >= large_order_threshold)
        .count();

    let signal_type = if buy_ratio >= 0.65 && large_buys >= 3 {
        FlowType::Accumulation
    } else if buy_ratio <= 0.35 && large_sells >= 3 {
        FlowType::Distribution
    } else {
        return None;
    };

    let dominant_large_count = match signal_type {
        FlowType::Accumulation => large_buys,
        FlowType::Distribution => large_sells,
    };

    let confidence = score_confidence(
        buy_ratio,
        dominant_large_count,
        total_volume,
        tier_thresholds.cascade_threshold,
        trades.len(),
    );

    Some(OrderFlowSignal {
        symbol: symbol.clone(),
        timestamp: now,
        confidence,
        window_s,
        buy_volume,
        sell_volume,
        buy_ratio,
        large_buys,
        large_sells,
        signal_type,
        net_delta: buy_volume - sell_volume,
        total_trades: trades.len(),
    })
}

fn score_confidence(
    buy_ratio: f64,
    dominant_large_count: usize,
    total_volume: f64,
    tier_threshold: f64,
    trade_count: usize,
) -> f64 {
    let mut confidence: f64 = 50.0;

    confidence += if buy_ratio > 0.8 || buy_ratio < 0.2 {
        20.0
    } else if buy_ratio > 0.75 || buy_ratio < 0.25 {
        15.0
    } else if buy_ratio > 0.7 || buy_ratio < 0.3 {
        10.0
    } else if buy_ratio > 0.65 || buy_ratio < 0.35 {
        5.0
    } else {
        0.0
    };

    confidence += if dominant_large_count >= 10 {
        20.0
    } else if dominant_large_count >= 7 {
        15.0
    } else if dominant_large_count >= 5 {
        10.0
    } else if dominant_large_count >= 3 {
        5.0
    } else {
        0.0
    };

    let ratio = if tier_threshold > 0.0 {
        total_volume / tier_threshold
    } else {
        0.0
    };
    confidence += if ratio > 5.0 {
        15.0
    } else if ratio > 2.5 {
        10.0
    } else if ratio > 1.0 {
        5.0
    } else {
        0.0
    };

    confidence += if trade_count > 100 {
        5.0
    } else if trade_count > 50 {
        3.0
    } else {
        0.0
    };

    confidence.min(99.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trades_with(buys: usize, sells: usize, large_vol: f64) -> Vec<TradeEvent> {
        let mut out = Vec::new();
        for _ in 0..buys {
            out.push(TradeEvent {
                symbol: Symbol::parse("BTCUSDT").unwrap(),
                exchange: "binance".into(),
                price: 100.0,
                side: TradeSide::Buy,
                vol: large_vol,
                timestamp_ms: 0,
            });
        }
        for _ in 0..sells {
            out.push(TradeEvent {
                symbol: Symbol::parse("BTCUSDT").unwrap(),
                exchange: "binance".into(),
                price: 100.0,
                side: TradeSide::Sell,
                vol: 1.0,
                timestamp_ms: 0,
            });
        }
        out
    }

    fn thresholds() -> TierThresholds {
        TierThresholds {
            cascade_threshold: 100.0,
            absorption_threshold: 50.0,
        }
    }

    #[test]
    fn fewer_than_min_trades_emits_nothing() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let trades = trades_with(3, 0, 100.0);
        assert!(detect(&sym, Utc::now(), &trades, 300, 10.0, thresholds()).is_none());
    }

    #[test]
    fn dominant_buys_with_large_orders_is_accumulation() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let trades = trades_with(7, 3, 100.0);
        let signal = detect(&sym, Utc::now(), &trades, 300, 10.0, thresholds()).unwrap();
        assert_eq!(signal.signal_type, FlowType::Accumulation);
        assert_eq!(signal.large_buys, 7);
    }

    #[test]
    fn insufficient_large_orders_suppresses_signal() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        // buy_ratio high but no individual trade crosses the large-order bar
        let trades = trades_with(7, 3, 1.0);
        assert!(detect(&sym, Utc::now(), &trades, 300, 10.0, thresholds()).is_none());
    }

    #[test]
    fn dominant_sells_with_large_orders_is_distribution() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let mut trades = trades_with(1, 9, 0.0);
        for t in trades.iter_mut().filter(|t| t.side == TradeSide::Sell) {
            t.vol = 100.0;
        }
        let signal = detect(&sym, Utc::now(), &trades, 300, 10.0, thresholds()).unwrap();
        assert_eq!(signal.signal_type, FlowType::Distribution);
    }
}
