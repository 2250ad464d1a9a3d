//! Detector outputs, the fused trading signal, and the tracked-signal lifecycle
//! (spec §3 "Detector signal", "Trading signal (fused)", "Tracked signal").

use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Directional bias carried by a fused trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

/// Which way the stop-hunt detector thinks the cascade is pointing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HuntDirection {
    /// Longs got liquidated; bullish continuation likely.
    ShortHunt,
    /// Shorts got liquidated; bearish continuation likely.
    LongHunt,
    /// Zero liquidation volume on either side (degenerate case).
    Unknown,
}

/// Order-flow analyzer classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    Accumulation,
    Distribution,
}

/// Event-pattern detector kinds (spec §3 "Event" variant, §4.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    LiquidationCascade,
    WhaleAccumulation,
    WhaleDistribution,
    VolumeSpike,
}

/// A price zone spanned by the liquidations that fed the cascade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceZone {
    pub min: f64,
    pub max: f64,
}

impl PriceZone {
    #[must_use]
    pub fn spread(&self) -> f64 {
        (self.max - self.min).abs()
    }
}

/// Stop-hunt detector output (spec §3, §4.5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopHuntSignal {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub total_volume: f64,
    pub liquidation_count: usize,
    pub direction: HuntDirection,
    pub directional_pct: f64,
    pub price_zone: PriceZone,
    pub absorption_volume: f64,
    pub absorption_detected: bool,
}

/// Order-flow analyzer output (spec §3, §4.5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFlowSignal {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub window_s: u64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_ratio: f64,
    pub large_buys: usize,
    pub large_sells: usize,
    pub signal_type: FlowType,
    pub net_delta: f64,
    pub total_trades: usize,
}

/// One of the three event-pattern sub-detector outputs (spec §4.5.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSignal {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub kind: EventKind,
    pub description: String,
    /// Diagnostic numbers specific to the sub-detector (ratios, counts, volumes).
    pub data: HashMap<String, f64>,
}

/// Type of a fused trading signal (spec §3 "Trading signal (fused)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    StopHunt,
    Accumulation,
    Distribution,
    Event,
}

/// Fused, prioritized trading signal — the pipeline's end product prior to
/// validation/tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: Symbol,
    pub signal_type: SignalType,
    pub direction: Direction,
    /// Clamped to [50, 99] once fused (spec §3).
    pub confidence: f64,
    pub sources: Vec<String>,
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    pub metadata: SignalMetadata,
}

/// Nested metadata carrying the contributing detector outputs plus baseline
/// context, attached to a fused `TradingSignal`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub stop_hunt: Option<StopHuntSignal>,
    pub order_flow: Option<OrderFlowSignal>,
    pub events: Vec<EventSignal>,
    pub baseline: Option<BaselineContext>,
}

/// Hourly-baseline context attached to outgoing signals (spec §4.3 `GetBaseline`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaselineContext {
    pub avg_hourly_liq_volume: f64,
    pub avg_hourly_trade_volume: f64,
    pub current_liq_multiplier: f64,
    pub current_trade_multiplier: f64,
}

impl TradingSignal {
    /// The dedup/cooldown key: (symbol, type, direction).
    #[must_use]
    pub fn signal_key(&self) -> (Symbol, SignalType, Direction) {
        (self.symbol.clone(), self.signal_type, self.direction)
    }

    /// A 5-percentage-point confidence band used to dedup near-identical
    /// signals, combined with the signal key (spec §3 "Cooldown / dedup state").
    #[must_use]
    pub fn confidence_band_hash(&self) -> (Symbol, SignalType, Direction, i64) {
        let band = ((self.confidence / 5.0).round() * 5.0) as i64;
        (self.symbol.clone(), self.signal_type, self.direction, band)
    }
}

impl std::hash::Hash for Direction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
    }
}

impl std::hash::Hash for SignalType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
    }
}

/// Possible outcomes labeled by the tracker once the hold window elapses
/// (spec §3 "Tracked signal").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Neutral,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Win => "WIN",
            Self::Loss => "LOSS",
            Self::Neutral => "NEUTRAL",
        }
    }

    #[must_use]
    pub const fn is_win(self) -> bool {
        matches!(self, Self::Win)
    }
}

/// An approved fused signal held until the hold window expires, per spec §3/§4.9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedSignal {
    pub signal: TradingSignal,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_price: f64,
    pub check_deadline: DateTime<Utc>,
    pub outcome: Option<Outcome>,
    pub exit_price: Option<f64>,
}

impl TrackedSignal {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn confidence_band_rounds_to_nearest_five() {
        let s = sample_signal(83.0);
        let (_, _, _, band) = s.confidence_band_hash();
        assert_eq!(band, 85);
    }

    #[test]
    fn confidence_band_rounds_down_when_closer() {
        let s = sample_signal(81.0);
        let (_, _, _, band) = s.confidence_band_hash();
        assert_eq!(band, 80);
    }

    #[test]
    fn signal_key_ignores_confidence() {
        let a = sample_signal(70.0);
        let b = sample_signal(95.0);
        assert_eq!(a.signal_key(), b.signal_key());
    }

    #[test]
    fn outcome_strings_match_spec() {
        assert_eq!(Outcome::Win.as_str(), "WIN");
        assert_eq!(Outcome::Loss.as_str(), "LOSS");
        assert_eq!(Outcome::Neutral.as_str(), "NEUTRAL");
    }
}
