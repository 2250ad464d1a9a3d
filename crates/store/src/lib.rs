//! Durable SQLite-backed storage for signals, outcomes, learner state,
//! hourly baselines, and OI/funding snapshots (spec §6 C14).

pub mod error;
pub mod migrations;
pub mod models;
pub mod store;

pub use error::{Result, StoreError};
pub use models::{
    ConfidenceStateRecord, DashboardCoinRecord, FundingSnapshotRecord, HourlyBaselineRecord,
    OiSnapshotRecord, SignalRecord, SignalStats, SignalStatsByType,
};
pub use store::Store;
