//! Row types for the six tables in the store (spec §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SignalRecord {
    pub id: i64,
    pub symbol: String,
    pub signal_type: String,
    pub direction: String,
    pub confidence: f64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub target_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub outcome: Option<String>,
    pub pnl_pct: Option<f64>,
    pub metadata_json: String,
    pub created_at: f64,
    pub checked_at: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConfidenceStateRecord {
    pub signal_type: String,
    pub win_rate: f64,
    pub history_json: String,
    pub updated_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DashboardCoinRecord {
    pub symbol: String,
    pub active: bool,
    pub added_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HourlyBaselineRecord {
    pub id: i64,
    pub symbol: String,
    pub liq_volume: f64,
    pub trade_volume: f64,
    pub recorded_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OiSnapshotRecord {
    pub id: i64,
    pub symbol: String,
    pub current_oi_usd: f64,
    pub previous_oi_usd: Option<f64>,
    pub oi_high_usd: Option<f64>,
    pub oi_low_usd: Option<f64>,
    pub oi_change_pct: Option<f64>,
    pub recorded_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FundingSnapshotRecord {
    pub id: i64,
    pub symbol: String,
    pub current_rate: f64,
    pub previous_rate: Option<f64>,
    pub rate_high: Option<f64>,
    pub rate_low: Option<f64>,
    pub recorded_at: f64,
}

/// Aggregate signal outcome stats (spec §6 `/api/stats/signals`), shape
/// adopted from the original's `get_signal_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct SignalStats {
    pub total: i64,
    pub wins: i64,
    pub losses: i64,
    pub neutral: i64,
    pub pending: i64,
    pub avg_pnl: Option<f64>,
    pub avg_win: Option<f64>,
    pub avg_loss: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SignalStatsByType {
    pub signal_type: String,
    pub total: i64,
    pub wins: i64,
    pub losses: i64,
    pub avg_pnl: Option<f64>,
}
