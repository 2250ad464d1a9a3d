//! Rolling OI/funding snapshot store and the alignment assessment derived
//! from it (spec component C4).

use std::collections::{HashMap, VecDeque};

use cascadeguard_core::{Direction, Symbol};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

const MAX_SNAPSHOTS: usize = 72;

/// An open-interest or funding snapshot derived from the latest two hourly
/// OHLC candles of the REST feed.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub current: f64,
    pub previous: f64,
    pub high: f64,
    pub low: f64,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// (current - previous) / previous, or 0 if previous is zero.
    #[must_use]
    pub fn change_pct(&self) -> f64 {
        if self.previous == 0.0 {
            0.0
        } else {
            (self.current - self.previous) / self.previous
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingAlignment {
    Neutral,
    Caution,
    Favorable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OiAlignment {
    SqueezeRisk,
    Confirmation,
    Weak,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinedAlignment {
    Favorable,
    Neutral,
    Unfavorable,
}

#[derive(Debug, Clone, Copy)]
pub struct AlignmentAssessment {
    pub funding: FundingAlignment,
    pub oi: OiAlignment,
    pub combined: CombinedAlignment,
}

struct BaseSymbolContext {
    oi: VecDeque<Snapshot>,
    funding: VecDeque<Snapshot>,
}

impl BaseSymbolContext {
    fn new() -> Self {
        Self {
            oi: VecDeque::new(),
            funding: VecDeque::new(),
        }
    }
}

/// Rolling store of up to 72 OI and 72 funding snapshots per base symbol
/// (6h at a 5-minute poll cadence), plus alignment derivation.
pub struct ContextBuffer {
    symbols: RwLock<HashMap<Symbol, BaseSymbolContext>>,
}

impl Default for ContextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            symbols: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_oi_snapshot(&self, base_symbol: Symbol, snapshot: Snapshot) {
        let mut symbols = self.symbols.write();
        let ctx = symbols.entry(base_symbol).or_insert_with(BaseSymbolContext::new);
        if ctx.oi.len() >= MAX_SNAPSHOTS {
            ctx.oi.pop_front();
        }
        ctx.oi.push_back(snapshot);
    }

    pub fn add_funding_snapshot(&self, base_symbol: Symbol, snapshot: Snapshot) {
        let mut symbols = self.symbols.write();
        let ctx = symbols.entry(base_symbol).or_insert_with(BaseSymbolContext::new);
        if ctx.funding.len() >= MAX_SNAPSHOTS {
            ctx.funding.pop_front();
        }
        ctx.funding.push_back(snapshot);
    }

    /// Derives the funding/OI/combined alignment for a direction. Returns
    /// `None` if no snapshot data exists yet for the base symbol — callers
    /// treat that as pass-through with zero confidence adjustment.
    #[must_use]
    pub fn assess(&self, base_symbol: &Symbol, direction: Direction) -> Option<AlignmentAssessment> {
        let symbols = self.symbols.read();
        let ctx = symbols.get(base_symbol)?;
        if ctx.oi.is_empty() && ctx.funding.is_empty() {
            return None;
        }

        let funding = ctx
            .funding
            .back()
            .map_or(FundingAlignment::Neutral, |snap| {
                funding_alignment(snap.current, direction)
            });
        let oi = ctx
            .oi
            .back()
            .map_or(OiAlignment::Neutral, |snap| oi_alignment(snap.change_pct()));
        let combined = combine(funding, oi);

        Some(AlignmentAssessment {
            funding,
            oi,
            combined,
        })
    }
}

fn funding_alignment(rate: f64, direction: Direction) -> FundingAlignment {
    if rate.abs() < 0.0001 {
        return FundingAlignment::Neutral;
    }
    match direction {
        Direction::Long => {
            if rate > 0.0005 {
                FundingAlignment::Caution
            } else if rate > 0.0 {
                FundingAlignment::Neutral
            } else {
                FundingAlignment::Favorable
            }
        }
        Direction::Short => {
            if rate < -0.0005 {
                FundingAlignment::Caution
            } else if rate < 0.0 {
                FundingAlignment::Neutral
            } else {
                FundingAlignment::Favorable
            }
        }
        Direction::Neutral => FundingAlignment::Neutral,
    }
}

fn oi_alignment(change_pct: f64) -> OiAlignment {
    if change_pct > 0.05 {
        OiAlignment::SqueezeRisk
    } else if change_pct > 0.02 {
        OiAlignment::Confirmation
    } else if change_pct < -0.01 {
        OiAlignment::Weak
    } else {
        OiAlignment::Neutral
    }
}

fn combine(funding: FundingAlignment, oi: OiAlignment) -> CombinedAlignment {
    if funding == FundingAlignment::Caution {
        return CombinedAlignment::Unfavorable;
    }
    if oi == OiAlignment::SqueezeRisk {
        return CombinedAlignment::Neutral;
    }
    if funding == FundingAlignment::Favorable
        && matches!(oi, OiAlignment::Confirmation | OiAlignment::Neutral)
    {
        return CombinedAlignment::Favorable;
    }
    CombinedAlignment::Neutral
}
