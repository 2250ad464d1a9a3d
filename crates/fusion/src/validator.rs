//! Signal validator: dedup, cooldown, rate limit, minimum confidence
//! (spec §4.8).

use std::collections::HashMap;

use cascadeguard_core::{Direction, SignalType, Symbol, TradingSignal};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

type SignalKey = (Symbol, SignalType, Direction);
type BandedHash = (Symbol, SignalType, Direction, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    BelowMinConfidence,
    Duplicate,
    Cooldown,
    RateLimited,
}

struct ValidatorState {
    cooldowns: HashMap<SignalKey, DateTime<Utc>>,
    recent_hashes: HashMap<BandedHash, DateTime<Utc>>,
    approved_at: Vec<DateTime<Utc>>,
    rejection_counts: HashMap<RejectionReason, u64>,
}

/// Enforces dedup/cooldown/rate-limit/min-confidence atomically.
pub struct SignalValidator {
    state: Mutex<ValidatorState>,
    min_confidence: f64,
    cooldown: Duration,
    max_per_hour: usize,
    dedup_window: Duration,
}

impl SignalValidator {
    #[must_use]
    pub fn new(min_confidence: f64, cooldown_minutes: i64, max_per_hour: usize, dedup_window_minutes: i64) -> Self {
        Self {
            state: Mutex::new(ValidatorState {
                cooldowns: HashMap::new(),
                recent_hashes: HashMap::new(),
                approved_at: Vec::new(),
                rejection_counts: HashMap::new(),
            }),
            min_confidence,
            cooldown: Duration::minutes(cooldown_minutes),
            max_per_hour,
            dedup_window: Duration::minutes(dedup_window_minutes),
        }
    }

    /// Returns `Ok(())` and atomically records the approval, or `Err(reason)`.
    pub fn validate(&self, signal: &TradingSignal, now: DateTime<Utc>) -> Result<(), RejectionReason> {
        if signal.confidence < self.min_confidence {
            return self.reject(RejectionReason::BelowMinConfidence);
        }

        let mut state = self.state.lock();

        let band_hash = signal.confidence_band_hash();
        if let Some(seen_at) = state.recent_hashes.get(&band_hash) {
            if now - *seen_at < self.dedup_window {
                drop(state);
                return self.reject(RejectionReason::Duplicate);
            }
        }

        let key = signal.signal_key();
        if let Some(expiry) = state.cooldowns.get(&key) {
            if now < *expiry {
                drop(state);
                return self.reject(RejectionReason::Cooldown);
            }
        }

        let cutoff = now - Duration::hours(1);
        state.approved_at.retain(|t| *t >= cutoff);
        if state.approved_at.len() >= self.max_per_hour {
            drop(state);
            return self.reject(RejectionReason::RateLimited);
        }

        state.approved_at.push(now);
        state.cooldowns.insert(key, now + self.cooldown);
        state.recent_hashes.insert(band_hash, now);

        Ok(())
    }

    fn reject(&self, reason: RejectionReason) -> Result<(), RejectionReason> {
        *self.state.lock().rejection_counts.entry(reason).or_insert(0) += 1;
        Err(reason)
    }

    #[must_use]
    pub fn rejection_count(&self, reason: RejectionReason) -> u64 {
        self.state.lock().rejection_counts.get(&reason).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascadeguard_core::SignalMetadata;

    fn sample(confidence: f64) -> TradingSignal {
        TradingSignal {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            signal_type: SignalType::StopHunt,
            direction: Direction::Long,
            confidence,
            sources: vec!["stop_hunt".into()],
            priority: 1,
            created_at: Utc::now(),
            metadata: SignalMetadata::default(),
        }
    }

    #[test]
    fn below_min_confidence_rejected() {
        let validator = SignalValidator::new(65.0, 5, 20, 10);
        let result = validator.validate(&sample(50.0), Utc::now());
        assert_eq!(result, Err(RejectionReason::BelowMinConfidence));
    }

    #[test]
    fn first_signal_approved_then_cooldown_blocks_repeat() {
        let validator = SignalValidator::new(65.0, 5, 20, 10);
        let now = Utc::now();
        assert!(validator.validate(&sample(90.0), now).is_ok());
        // same signal key immediately after: cooldown still active
        let second = validator.validate(&sample(70.0), now + Duration::seconds(1));
        assert!(second.is_err());
    }

    #[test]
    fn duplicate_confidence_band_blocked_within_dedup_window() {
        let validator = SignalValidator::new(65.0, 0, 20, 10);
        let now = Utc::now();
        assert!(validator.validate(&sample(90.0), now).is_ok());
        // cooldown is 0 minutes so cooldown won't block, but band hash will
        let result = validator.validate(&sample(91.0), now + Duration::seconds(1));
        assert_eq!(result, Err(RejectionReason::Duplicate));
    }

    #[test]
    fn rate_limit_blocks_after_max_per_hour() {
        let validator = SignalValidator::new(65.0, 0, 1, 0);
        let now = Utc::now();
        assert!(validator.validate(&sample(90.0), now).is_ok());
        let second = validator.validate(&sample(95.0), now + Duration::minutes(30));
        // different confidence band (90 vs 95 -> band 90 vs 95, different) but same signal key cooldown=0
        assert!(second.is_err());
    }
}
