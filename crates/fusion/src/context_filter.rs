//! Context filter: blocks or adjusts a fused signal using the market-context
//! alignment assessment (spec §4.4 C9).

use cascadeguard_buffers::{AlignmentAssessment, CombinedAlignment, FundingAlignment, OiAlignment};
use cascadeguard_core::TradingSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Strict,
    Normal,
    Permissive,
}

impl FilterMode {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "strict" => Self::Strict,
            "permissive" => Self::Permissive,
            _ => Self::Normal,
        }
    }
}

/// Outcome of applying the context filter: either the signal is blocked, or
/// it passes with a (possibly zero) confidence adjustment already applied.
pub enum FilterOutcome {
    Blocked,
    Passed(TradingSignal),
}

/// Applies the filter. `assessment` is `None` when no OI/funding data exists
/// yet for the base symbol — that case always passes through unadjusted.
#[must_use]
pub fn apply(
    mut signal: TradingSignal,
    assessment: Option<AlignmentAssessment>,
    mode: FilterMode,
    adjustment_enabled: bool,
) -> FilterOutcome {
    let Some(assessment) = assessment else {
        return FilterOutcome::Passed(signal);
    };

    let blocked = match mode {
        FilterMode::Strict => assessment.combined != CombinedAlignment::Favorable,
        FilterMode::Normal => assessment.combined == CombinedAlignment::Unfavorable,
        FilterMode::Permissive => false,
    };
    if blocked {
        return FilterOutcome::Blocked;
    }

    if adjustment_enabled {
        signal.confidence = (signal.confidence + confidence_adjustment(assessment)).clamp(50.0, 99.0);
    }

    FilterOutcome::Passed(signal)
}

fn confidence_adjustment(assessment: AlignmentAssessment) -> f64 {
    match assessment.combined {
        CombinedAlignment::Favorable => 5.0,
        CombinedAlignment::Unfavorable => -10.0,
        CombinedAlignment::Neutral => {
            let mut adjustment = 0.0;
            if assessment.funding == FundingAlignment::Favorable || assessment.oi == OiAlignment::Confirmation {
                adjustment += 2.0;
            }
            if assessment.oi == OiAlignment::SqueezeRisk {
                adjustment -= 3.0;
            }
            adjustment
        }
    }
}
