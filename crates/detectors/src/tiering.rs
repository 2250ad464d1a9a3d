//! Tier classification: symbols are bucketed into one of three tiers, each
//! with its own cascade/absorption thresholds (spec §4.5).

use cascadeguard_core::config::ThresholdsConfig;
use cascadeguard_core::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    One,
    Two,
    Three,
}

#[derive(Debug, Clone, Copy)]
pub struct TierThresholds {
    pub cascade_threshold: f64,
    pub absorption_threshold: f64,
}

#[must_use]
pub fn classify_tier(symbol: &Symbol, tier1: &[String], tier2: &[String]) -> Tier {
    let s = symbol.as_str();
    if tier1.iter().any(|t| t == s) {
        Tier::One
    } else if tier2.iter().any(|t| t == s) {
        Tier::Two
    } else {
        Tier::Three
    }
}

#[must_use]
pub fn thresholds_for(tier: Tier, cfg: &ThresholdsConfig) -> TierThresholds {
    match tier {
        Tier::One => TierThresholds {
            cascade_threshold: cfg.tier1_cascade,
            absorption_threshold: cfg.tier1_absorption,
        },
        Tier::Two => TierThresholds {
            cascade_threshold: cfg.tier2_cascade,
            absorption_threshold: cfg.tier2_absorption,
        },
        Tier::Three => TierThresholds {
            cascade_threshold: cfg.tier3_cascade,
            absorption_threshold: cfg.tier3_absorption,
        },
    }
}

/// Whale-window large-order threshold, tier-scaled: T1 = base, T2 = base*0.5,
/// T3 = base*0.2 (spec §4.5.3).
#[must_use]
pub fn whale_large_order_threshold(tier: Tier, base: f64) -> f64 {
    match tier {
        Tier::One => base,
        Tier::Two => base * 0.5,
        Tier::Three => base * 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_tier1_then_tier2_then_default_tier3() {
        let sym = Symbol::parse("BTCUSDT").unwrap();
        let tier1 = vec!["BTCUSDT".to_string()];
        let tier2 = vec!["ETHUSDT".to_string()];
        assert_eq!(classify_tier(&sym, &tier1, &tier2), Tier::One);

        let eth = Symbol::parse("ETHUSDT").unwrap();
        assert_eq!(classify_tier(&eth, &tier1, &tier2), Tier::Two);

        let sol = Symbol::parse("SOLUSDT").unwrap();
        assert_eq!(classify_tier(&sol, &tier1, &tier2), Tier::Three);
    }

    #[test]
    fn whale_threshold_scales_down_by_tier() {
        assert_eq!(whale_large_order_threshold(Tier::One, 10_000.0), 10_000.0);
        assert_eq!(whale_large_order_threshold(Tier::Two, 10_000.0), 5_000.0);
        assert_eq!(whale_large_order_threshold(Tier::Three, 10_000.0), 2_000.0);
    }
}
