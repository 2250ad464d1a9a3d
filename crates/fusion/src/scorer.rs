//! Confidence scorer: adjusts fused confidence from persisted per-type
//! win-rate, recent trend, and metadata quality features (spec §4.7).

use std::collections::{HashMap, VecDeque};

use cascadeguard_core::{FlowType, SignalType, TradingSignal};
use parking_lot::RwLock;

const HISTORY_CAP: usize = 100;
const TREND_WINDOW: usize = 10;
const DEFAULT_LEARNING_RATE: f64 = 0.1;

struct LearnerState {
    history: VecDeque<bool>,
    smoothed_win_rate: f64,
}

impl LearnerState {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            smoothed_win_rate: 0.5,
        }
    }

    fn recent_trend(&self) -> f64 {
        if self.history.is_empty() {
            return 0.5;
        }
        let window: Vec<bool> = self
            .history
            .iter()
            .rev()
            .take(TREND_WINDOW)
            .copied()
            .collect();
        let wins = window.iter().filter(|w| **w).count();
        wins as f64 / window.len() as f64
    }
}

/// Persisted per-signal-type win-rate learner plus the scoring function that
/// consumes it. `restore` / `snapshot` are the store boundary (spec §6) and
/// carry the full outcome history, not just the smoothed win rate, so a
/// save-then-load round trip reproduces both exactly.
pub struct ConfidenceScorer {
    states: RwLock<HashMap<SignalType, LearnerState>>,
    learning_rate: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_RATE)
    }
}

impl ConfidenceScorer {
    #[must_use]
    pub fn new(learning_rate: f64) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            learning_rate,
        }
    }

    /// Restores a persisted smoothed win rate and outcome history for a
    /// signal type (store load). `history` is oldest-first, capped to
    /// `HISTORY_CAP` entries.
    pub fn restore(&self, signal_type: SignalType, smoothed_win_rate: f64, history: Vec<bool>) {
        let mut states = self.states.write();
        let state = states.entry(signal_type).or_insert_with(LearnerState::new);
        state.smoothed_win_rate = smoothed_win_rate;
        state.history = history.into_iter().rev().take(HISTORY_CAP).rev().collect();
    }

    #[must_use]
    pub fn win_rate(&self, signal_type: SignalType) -> f64 {
        self.states
            .read()
            .get(&signal_type)
            .map_or(0.5, |s| s.smoothed_win_rate)
    }

    /// Returns every tracked signal type's current smoothed win rate and
    /// outcome history (oldest-first), for periodic persistence (the
    /// `snapshot` half of the store boundary noted above).
    #[must_use]
    pub fn snapshot(&self) -> Vec<(SignalType, f64, Vec<bool>)> {
        self.states
            .read()
            .iter()
            .map(|(signal_type, state)| {
                (*signal_type, state.smoothed_win_rate, state.history.iter().copied().collect())
            })
            .collect()
    }

    /// Adjusts `signal.confidence` in place and returns the scored value,
    /// clamped to [50, 99]. `tier_absorption_threshold` is the absorption
    /// threshold for the signal's tier, used by the quality boost.
    #[must_use]
    pub fn score(&self, signal: &TradingSignal, tier_absorption_threshold: f64) -> f64 {
        let states = self.states.read();
        let state = states.get(&signal.signal_type);
        let win_rate = state.map_or(0.5, |s| s.smoothed_win_rate);
        let trend = state.map_or(0.5, LearnerState::recent_trend);

        let mut confidence = signal.confidence;

        confidence += if win_rate > 0.7 {
            5.0
        } else if win_rate > 0.6 {
            3.0
        } else if win_rate < 0.4 {
            -5.0
        } else if win_rate < 0.5 {
            -3.0
        } else {
            0.0
        };

        confidence += if trend > 0.75 {
            3.0
        } else if trend < 0.25 {
            -3.0
        } else {
            0.0
        };

        confidence += quality_boost(signal, tier_absorption_threshold);

        confidence.clamp(50.0, 99.0)
    }

    /// Appends an outcome to the bounded history and blends the empirical
    /// window win-rate into the smoothed rate by `learning_rate`.
    pub fn record_result(&self, signal_type: SignalType, won: bool) {
        let mut states = self.states.write();
        let state = states.entry(signal_type).or_insert_with(LearnerState::new);

        if state.history.len() >= HISTORY_CAP {
            state.history.pop_front();
        }
        state.history.push_back(won);

        let wins = state.history.iter().filter(|w| **w).count();
        let empirical = wins as f64 / state.history.len() as f64;
        state.smoothed_win_rate =
            state.smoothed_win_rate * (1.0 - self.learning_rate) + empirical * self.learning_rate;
    }
}

fn quality_boost(signal: &TradingSignal, tier_absorption_threshold: f64) -> f64 {
    let mut boost: f64 = 0.0;

    if let Some(sh) = &signal.metadata.stop_hunt {
        if tier_absorption_threshold > 0.0 {
            let ratio = sh.absorption_volume / tier_absorption_threshold;
            boost += if ratio > 5.0 {
                2.0
            } else if ratio > 2.0 {
                1.0
            } else {
                0.0
            };
        }
        if sh.directional_pct > 0.85 {
            boost += 2.0;
        }
    }

    if let Some(of) = &signal.metadata.order_flow {
        boost += if of.buy_ratio > 0.8 || of.buy_ratio < 0.2 {
            1.5
        } else if of.buy_ratio > 0.65 || of.buy_ratio < 0.35 {
            0.5
        } else {
            0.0
        };
        let dominant_large_count = match of.signal_type {
            FlowType::Accumulation => of.large_buys,
            FlowType::Distribution => of.large_sells,
        };
        boost += if dominant_large_count >= 10 {
            1.5
        } else if dominant_large_count >= 5 {
            0.5
        } else {
            0.0
        };
    }

    if signal.metadata.events.len() >= 2 {
        boost += 1.0;
    }

    boost.clamp(-5.0, 5.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascadeguard_core::{Direction, SignalMetadata, Symbol};
    use chrono::Utc;

    fn sample_signal(confidence: f64) -> TradingSignal {
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
    fn default_win_rate_is_neutral() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(scorer.win_rate(SignalType::StopHunt), 0.5);
    }

    #[test]
    fn high_win_rate_adds_bonus() {
        let scorer = ConfidenceScorer::default();
        scorer.restore(SignalType::StopHunt, 0.8, Vec::new());
        let scored = scorer.score(&sample_signal(70.0), 100.0);
        assert!(scored >= 75.0);
    }

    #[test]
    fn restore_round_trips_history_through_snapshot() {
        let scorer = ConfidenceScorer::default();
        let history = vec![true, true, false, true];
        scorer.restore(SignalType::StopHunt, 0.65, history.clone());
        let snapshot = scorer.snapshot();
        let (_, win_rate, restored_history) = snapshot
            .into_iter()
            .find(|(t, _, _)| *t == SignalType::StopHunt)
            .unwrap();
        assert_eq!(win_rate, 0.65);
        assert_eq!(restored_history, history);
    }

    #[test]
    fn restore_caps_history_to_most_recent() {
        let scorer = ConfidenceScorer::default();
        let history: Vec<bool> = (0..HISTORY_CAP + 10).map(|i| i % 2 == 0).collect();
        scorer.restore(SignalType::StopHunt, 0.5, history.clone());
        let (_, _, restored_history) = scorer
            .snapshot()
            .into_iter()
            .find(|(t, _, _)| *t == SignalType::StopHunt)
            .unwrap();
        assert_eq!(restored_history.len(), HISTORY_CAP);
        assert_eq!(restored_history, history[history.len() - HISTORY_CAP..]);
    }

    #[test]
    fn record_result_blends_by_learning_rate() {
        let scorer = ConfidenceScorer::new(0.5);
        scorer.record_result(SignalType::StopHunt, true);
        // smoothed = 0.5*0.5 + 1.0*0.5 = 0.75
        assert!((scorer.win_rate(SignalType::StopHunt) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn score_clamped_to_range() {
        let scorer = ConfidenceScorer::default();
        scorer.restore(SignalType::StopHunt, 0.9, Vec::new());
        let scored = scorer.score(&sample_signal(97.0), 1.0);
        assert!(scored <= 99.0);
        let low = scorer.score(&sample_signal(40.0), 1.0);
        assert!(low >= 50.0);
    }
}
