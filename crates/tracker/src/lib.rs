//! Entry/stop/target computation and outcome labeling (spec §4.9 C10).
//!
//! Only signals carrying a stop-hunt price zone are tracked to outcome —
//! order-flow- and event-only signals have no price zone to derive levels
//! from and are published without a tracked-signal record.

use cascadeguard_core::{Direction, Outcome, TrackedSignal, TradingSignal};
use chrono::{DateTime, Duration, Utc};

/// Opens a tracked signal from the stop-hunt price zone, if present.
#[must_use]
pub fn open(signal: TradingSignal, now: DateTime<Utc>, check_interval_seconds: i64) -> Option<TrackedSignal> {
    let zone = signal.metadata.stop_hunt.as_ref()?.price_zone;
    if zone.max <= 0.0 {
        return None;
    }

    let spread = zone.spread();
    let is_long = signal.direction == Direction::Long;

    let (entry_price, stop_loss) = if is_long {
        (zone.max, zone.min - spread * 0.3)
    } else {
        (zone.min, zone.max + spread * 0.3)
    };
    let risk = (entry_price - stop_loss).abs();
    let target_price = if is_long {
        entry_price + risk * 2.0
    } else {
        entry_price - risk * 2.0
    };

    Some(TrackedSignal {
        signal,
        entry_price,
        stop_loss,
        target_price,
        check_deadline: now + Duration::seconds(check_interval_seconds),
        outcome: None,
        exit_price: None,
    })
}

/// Labels the outcome of a pending tracked signal given the latest observed
/// price. Returns `None` if the signal is not past its check deadline and
/// has not exceeded the extended deadline.
#[must_use]
pub fn evaluate(
    tracked: &TrackedSignal,
    now: DateTime<Utc>,
    latest_price: Option<f64>,
    check_interval_seconds: i64,
) -> Option<(Outcome, Option<f64>)> {
    if now < tracked.check_deadline {
        return None;
    }

    let Some(price) = latest_price else {
        // No price data available yet: extend up to 3x the original interval,
        // then label NEUTRAL rather than hold forever.
        let extended_deadline =
            tracked.check_deadline + Duration::seconds(check_interval_seconds * 2);
        return if now >= extended_deadline {
            Some((Outcome::Neutral, None))
        } else {
            None
        };
    };

    let midpoint = (tracked.entry_price + tracked.target_price) / 2.0;
    let outcome = match tracked.signal.direction {
        Direction::Long => {
            if price >= tracked.target_price {
                Outcome::Win
            } else if price <= tracked.stop_loss {
                Outcome::Loss
            } else if price >= midpoint {
                Outcome::Win
            } else if price < tracked.entry_price {
                Outcome::Loss
            } else {
                Outcome::Neutral
            }
        }
        Direction::Short => {
            if price <= tracked.target_price {
                Outcome::Win
            } else if price >= tracked.stop_loss {
                Outcome::Loss
            } else if price <= midpoint {
                Outcome::Win
            } else if price > tracked.entry_price {
                Outcome::Loss
            } else {
                Outcome::Neutral
            }
        }
        Direction::Neutral => Outcome::Neutral,
    };

    Some((outcome, Some(price)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascadeguard_core::{
        HuntDirection, PriceZone, SignalMetadata, SignalType, StopHuntSignal, Symbol,
    };

    fn signal_with_zone(direction: Direction, min: f64, max: f64) -> TradingSignal {
        TradingSignal {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            signal_type: SignalType::StopHunt,
            direction,
            confidence: 80.0,
            sources: vec!["stop_hunt".into()],
            priority: 1,
            created_at: Utc::now(),
            metadata: SignalMetadata {
                stop_hunt: Some(StopHuntSignal {
                    symbol: Symbol::parse("BTCUSDT").unwrap(),
                    timestamp: Utc::now(),
                    confidence: 80.0,
                    total_volume: 1000.0,
                    liquidation_count: 10,
                    direction: HuntDirection::ShortHunt,
                    directional_pct: 0.8,
                    price_zone: PriceZone { min, max },
                    absorption_volume: 0.0,
                    absorption_detected: false,
                }),
                order_flow: None,
                events: vec![],
                baseline: None,
            },
        }
    }

    fn signal_without_zone() -> TradingSignal {
        TradingSignal {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            signal_type: SignalType::Event,
            direction: Direction::Neutral,
            confidence: 70.0,
            sources: vec!["events".into()],
            priority: 3,
            created_at: Utc::now(),
            metadata: SignalMetadata::default(),
        }
    }

    #[test]
    fn opens_long_levels_from_zone() {
        let signal = signal_with_zone(Direction::Long, 90.0, 100.0);
        let tracked = open(signal, Utc::now(), 900).unwrap();
        assert_eq!(tracked.entry_price, 100.0);
        assert_eq!(tracked.stop_loss, 90.0 - 3.0);
        assert_eq!(tracked.target_price, 100.0 + 2.0 * (100.0 - 87.0));
    }

    #[test]
    fn no_zone_means_not_tracked() {
        assert!(open(signal_without_zone(), Utc::now(), 900).is_none());
    }

    #[test]
    fn long_reaching_target_is_a_win() {
        let signal = signal_with_zone(Direction::Long, 90.0, 100.0);
        let now = Utc::now();
        let tracked = open(signal, now, 900).unwrap();
        let later = now + Duration::seconds(901);
        let (outcome, exit) = evaluate(&tracked, later, Some(tracked.target_price + 1.0), 900).unwrap();
        assert_eq!(outcome, Outcome::Win);
        assert!(exit.is_some());
    }

    #[test]
    fn long_hitting_stop_is_a_loss() {
        let signal = signal_with_zone(Direction::Long, 90.0, 100.0);
        let now = Utc::now();
        let tracked = open(signal, now, 900).unwrap();
        let later = now + Duration::seconds(901);
        let (outcome, _) = evaluate(&tracked, later, Some(tracked.stop_loss - 1.0), 900).unwrap();
        assert_eq!(outcome, Outcome::Loss);
    }

    #[test]
    fn missing_price_extends_deadline_before_neutral() {
        let signal = signal_with_zone(Direction::Long, 90.0, 100.0);
        let now = Utc::now();
        let tracked = open(signal, now, 900).unwrap();
        let just_past = now + Duration::seconds(901);
        assert!(evaluate(&tracked, just_past, None, 900).is_none());
        let far_past = now + Duration::seconds(900 * 3 + 1);
        let (outcome, exit) = evaluate(&tracked, far_past, None, 900).unwrap();
        assert_eq!(outcome, Outcome::Neutral);
        assert!(exit.is_none());
    }

    #[test]
    fn not_yet_due_returns_none() {
        let signal = signal_with_zone(Direction::Long, 90.0, 100.0);
        let now = Utc::now();
        let tracked = open(signal, now, 900).unwrap();
        assert!(evaluate(&tracked, now + Duration::seconds(10), Some(95.0), 900).is_none());
    }
}
