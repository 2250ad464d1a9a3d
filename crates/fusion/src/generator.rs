//! Signal fusion: combines per-detector outputs into at most one prioritized
//! `TradingSignal` (spec §4.6).

use cascadeguard_core::{
    BaselineContext, Direction, EventSignal, HuntDirection, FlowType, OrderFlowSignal,
    SignalMetadata, SignalType, StopHuntSignal, Symbol, TradingSignal,
};
use chrono::{DateTime, Utc};

/// Fuses at most one stop-hunt signal, one order-flow signal, and a list of
/// event signals into a single `TradingSignal`. Returns `None` if nothing
/// was present, or if the fused confidence falls below `min_confidence`.
#[must_use]
pub fn fuse(
    symbol: &Symbol,
    now: DateTime<Utc>,
    stop_hunt: Option<StopHuntSignal>,
    order_flow: Option<OrderFlowSignal>,
    events: Vec<EventSignal>,
    baseline: Option<BaselineContext>,
    min_confidence: f64,
) -> Option<TradingSignal> {
    let (signal_type, direction, sources) = classify(&stop_hunt, &order_flow, &events)?;

    let mut confidence = weighted_confidence(&stop_hunt, &order_flow, &events);

    if agrees(&stop_hunt, &order_flow) {
        confidence += 10.0;
    }
    confidence = confidence.min(99.0);

    if confidence < min_confidence {
        return None;
    }

    let present_count = [stop_hunt.is_some(), order_flow.is_some(), !events.is_empty()]
        .iter()
        .filter(|p| **p)
        .count();
    let priority = if present_count == 3 || (present_count >= 2 && confidence >= 80.0) {
        1
    } else if (stop_hunt.is_some() || order_flow.is_some()) && confidence >= 70.0 {
        2
    } else {
        3
    };

    Some(TradingSignal {
        symbol: symbol.clone(),
        signal_type,
        direction,
        confidence,
        sources,
        priority,
        created_at: now,
        metadata: SignalMetadata {
            stop_hunt,
            order_flow,
            events,
            baseline,
        },
    })
}

fn classify(
    stop_hunt: &Option<StopHuntSignal>,
    order_flow: &Option<OrderFlowSignal>,
    events: &[EventSignal],
) -> Option<(SignalType, Direction, Vec<String>)> {
    if let Some(sh) = stop_hunt {
        match sh.direction {
            HuntDirection::ShortHunt => {
                return Some((SignalType::StopHunt, Direction::Long, vec!["stop_hunt".into()]))
            }
            HuntDirection::LongHunt => {
                return Some((SignalType::StopHunt, Direction::Short, vec!["stop_hunt".into()]))
            }
            HuntDirection::Unknown => {}
        }
    }
    if let Some(of) = order_flow {
        match of.signal_type {
            FlowType::Accumulation => {
                return Some((SignalType::Accumulation, Direction::Long, vec!["order_flow".into()]))
            }
            FlowType::Distribution => {
                return Some((SignalType::Distribution, Direction::Short, vec!["order_flow".into()]))
            }
        }
    }
    if !events.is_empty() {
        return Some((SignalType::Event, Direction::Neutral, vec!["events".into()]));
    }
    None
}

fn weighted_confidence(
    stop_hunt: &Option<StopHuntSignal>,
    order_flow: &Option<OrderFlowSignal>,
    events: &[EventSignal],
) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    if let Some(sh) = stop_hunt {
        weighted_sum += sh.confidence * 0.50;
        weight_total += 0.50;
    }
    if let Some(of) = order_flow {
        weighted_sum += of.confidence * 0.35;
        weight_total += 0.35;
    }
    if !events.is_empty() {
        let mean: f64 = events.iter().map(|e| e.confidence).sum::<f64>() / events.len() as f64;
        weighted_sum += mean * 0.15;
        weight_total += 0.15;
    }

    if weight_total == 0.0 {
        0.0
    } else {
        weighted_sum / weight_total
    }
}

fn agrees(stop_hunt: &Option<StopHuntSignal>, order_flow: &Option<OrderFlowSignal>) -> bool {
    match (stop_hunt, order_flow) {
        (Some(sh), Some(of)) => matches!(
            (sh.direction, of.signal_type),
            (HuntDirection::ShortHunt, FlowType::Accumulation)
                | (HuntDirection::LongHunt, FlowType::Distribution)
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascadeguard_core::PriceZone;

    fn sample_stop_hunt(direction: HuntDirection, confidence: f64) -> StopHuntSignal {
        StopHuntSignal {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            timestamp: Utc::now(),
            confidence,
            total_volume: 1000.0,
            liquidation_count: 10,
            direction,
            directional_pct: 0.8,
            price_zone: PriceZone { min: 90.0, max: 100.0 },
            absorption_volume: 50.0,
            absorption_detected: false,
        }
    }

    fn sample_order_flow(signal_type: FlowType, confidence: f64) -> OrderFlowSignal {
        OrderFlowSignal {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            timestamp: Utc::now(),
            confidence,
            window_s: 300,
            buy_volume: 100.0,
            sell_volume: 50.0,
            buy_ratio: 0.66,
            large_buys: 4,
            large_sells: 0,
            signal_type,
            net_delta: 50.0,
            total_trades: 20,
        }
    }

    #[test]
    fn stop_hunt_dominates_over_order_flow() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let sh = sample_stop_hunt(HuntDirection::ShortHunt, 80.0);
        let of = sample_order_flow(FlowType::Distribution, 80.0);
        let signal = fuse(&sym, Utc::now(), Some(sh), Some(of), vec![], None, 50.0).unwrap();
        assert_eq!(signal.signal_type, SignalType::StopHunt);
        assert_eq!(signal.direction, Direction::Long);
    }

    #[test]
    fn agreement_between_stop_hunt_and_order_flow_adds_bonus() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let sh = sample_stop_hunt(HuntDirection::ShortHunt, 70.0);
        let of = sample_order_flow(FlowType::Accumulation, 70.0);
        let signal = fuse(&sym, Utc::now(), Some(sh), Some(of), vec![], None, 50.0).unwrap();
        // weighted avg = 70*0.5/0.85 + 70*0.35/0.85 = 70, +10 bonus = 80
        assert!((signal.confidence - 80.0).abs() < 1e-9);
    }

    #[test]
    fn below_min_confidence_emits_nothing() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let sh = sample_stop_hunt(HuntDirection::ShortHunt, 40.0);
        assert!(fuse(&sym, Utc::now(), Some(sh), None, vec![], None, 65.0).is_none());
    }

    #[test]
    fn no_inputs_emits_nothing() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        assert!(fuse(&sym, Utc::now(), None, None, vec![], None, 50.0).is_none());
    }

    #[test]
    fn priority_one_when_all_three_present() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let sh = sample_stop_hunt(HuntDirection::ShortHunt, 90.0);
        let of = sample_order_flow(FlowType::Accumulation, 90.0);
        let events = vec![cascadeguard_core::EventSignal {
            symbol: sym.clone(),
            timestamp: Utc::now(),
            confidence: 90.0,
            kind: cascadeguard_core::EventKind::VolumeSpike,
            description: "spike".into(),
            data: Default::default(),
        }];
        let signal = fuse(&sym, Utc::now(), Some(sh), Some(of), events, None, 50.0).unwrap();
        assert_eq!(signal.priority, 1);
    }
}
