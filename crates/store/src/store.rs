//! Durable store for signals, outcomes, learner state, baselines, and
//! OI/funding snapshots (spec §6 C14).

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::migrations::SCHEMA;
use crate::models::{
    ConfidenceStateRecord, DashboardCoinRecord, FundingSnapshotRecord, HourlyBaselineRecord,
    OiSnapshotRecord, SignalRecord, SignalStats, SignalStatsByType,
};

const MAX_EXPORT_ROWS: i64 = 5000;
const DEFAULT_BASELINE_CLEANUP_HOURS: i64 = 72;
const DEFAULT_SNAPSHOT_CLEANUP_HOURS: i64 = 168;

fn to_epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1_000_000_000.0
}

/// Single-connection SQLite store; all writes are serialized through one
/// pooled connection to avoid `SQLITE_BUSY` under WAL.
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the database at `database_url` and
    /// applies the schema.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or the
    /// schema cannot be created.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        tracing::info!(database_url, "store connected");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -- signals --------------------------------------------------------

    /// Inserts a new signal row, returning its id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn save_signal(
        &self,
        symbol: &str,
        signal_type: &str,
        direction: &str,
        confidence: f64,
        entry_price: Option<f64>,
        stop_loss: Option<f64>,
        target_price: Option<f64>,
        metadata_json: &str,
    ) -> Result<i64> {
        let created_at = to_epoch_seconds(Utc::now());
        let row = sqlx::query(
            "INSERT INTO signals
               (symbol, signal_type, direction, confidence, entry_price, stop_loss,
                target_price, metadata_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(signal_type)
        .bind(direction)
        .bind(confidence)
        .bind(entry_price)
        .bind(stop_loss)
        .bind(target_price)
        .bind(metadata_json)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(row.last_insert_rowid())
    }

    /// Records the outcome of a tracked signal.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_signal_outcome(
        &self,
        signal_id: i64,
        outcome: &str,
        exit_price: f64,
        pnl_pct: f64,
    ) -> Result<()> {
        let checked_at = to_epoch_seconds(Utc::now());
        sqlx::query(
            "UPDATE signals SET outcome = ?, exit_price = ?, pnl_pct = ?, checked_at = ?
             WHERE id = ?",
        )
        .bind(outcome)
        .bind(exit_price)
        .bind(pnl_pct)
        .bind(checked_at)
        .bind(signal_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn recent_signals(&self, limit: i64) -> Result<Vec<SignalRecord>> {
        let limit = limit.clamp(1, MAX_EXPORT_ROWS);
        let rows = sqlx::query_as::<_, SignalRecord>(
            "SELECT * FROM signals ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn signals_by_symbol(&self, symbol: &str, limit: i64) -> Result<Vec<SignalRecord>> {
        let limit = limit.clamp(1, MAX_EXPORT_ROWS);
        let rows = sqlx::query_as::<_, SignalRecord>(
            "SELECT * FROM signals WHERE symbol = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn signal_stats(&self) -> Result<SignalStats> {
        let stats = sqlx::query_as::<_, SignalStats>(
            "SELECT
                COUNT(*) as total,
                SUM(CASE WHEN outcome = 'WIN' THEN 1 ELSE 0 END) as wins,
                SUM(CASE WHEN outcome = 'LOSS' THEN 1 ELSE 0 END) as losses,
                SUM(CASE WHEN outcome = 'NEUTRAL' THEN 1 ELSE 0 END) as neutral,
                SUM(CASE WHEN outcome IS NULL THEN 1 ELSE 0 END) as pending,
                AVG(CASE WHEN outcome IN ('WIN','LOSS') THEN pnl_pct END) as avg_pnl,
                AVG(CASE WHEN outcome = 'WIN' THEN pnl_pct END) as avg_win,
                AVG(CASE WHEN outcome = 'LOSS' THEN pnl_pct END) as avg_loss
             FROM signals",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn signal_stats_by_type(&self) -> Result<Vec<SignalStatsByType>> {
        let rows = sqlx::query_as::<_, SignalStatsByType>(
            "SELECT
                signal_type,
                COUNT(*) as total,
                SUM(CASE WHEN outcome = 'WIN' THEN 1 ELSE 0 END) as wins,
                SUM(CASE WHEN outcome = 'LOSS' THEN 1 ELSE 0 END) as losses,
                AVG(CASE WHEN outcome IN ('WIN','LOSS') THEN pnl_pct END) as avg_pnl
             FROM signals
             GROUP BY signal_type",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Renders recent signals as CSV text (spec §6 `/api/export/signals.csv`).
    ///
    /// # Errors
    /// Returns an error if the query or CSV serialization fails.
    pub async fn export_signals_csv(&self, limit: i64) -> Result<String> {
        let limit = limit.clamp(1, MAX_EXPORT_ROWS);
        let rows = sqlx::query_as::<_, SignalRecord>(
            "SELECT * FROM signals ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(String::new());
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "id", "symbol", "signal_type", "direction", "confidence", "entry_price",
            "stop_loss", "target_price", "exit_price", "outcome", "pnl_pct", "created_at",
            "checked_at",
        ])?;
        for row in rows {
            writer.write_record(&[
                row.id.to_string(),
                row.symbol,
                row.signal_type,
                row.direction,
                row.confidence.to_string(),
                row.entry_price.map_or_else(String::new, |v| v.to_string()),
                row.stop_loss.map_or_else(String::new, |v| v.to_string()),
                row.target_price.map_or_else(String::new, |v| v.to_string()),
                row.exit_price.map_or_else(String::new, |v| v.to_string()),
                row.outcome.unwrap_or_default(),
                row.pnl_pct.map_or_else(String::new, |v| v.to_string()),
                format_epoch(row.created_at),
                row.checked_at.map_or_else(String::new, format_epoch),
            ])?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // -- confidence state -------------------------------------------------

    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn save_confidence_state(
        &self,
        signal_type: &str,
        win_rate: f64,
        history_json: &str,
    ) -> Result<()> {
        let updated_at = to_epoch_seconds(Utc::now());
        sqlx::query(
            "INSERT INTO confidence_state (signal_type, win_rate, history_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(signal_type) DO UPDATE SET
               win_rate = excluded.win_rate,
               history_json = excluded.history_json,
               updated_at = excluded.updated_at",
        )
        .bind(signal_type)
        .bind(win_rate)
        .bind(history_json)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load_confidence_state(&self) -> Result<Vec<ConfidenceStateRecord>> {
        let rows = sqlx::query_as::<_, ConfidenceStateRecord>("SELECT * FROM confidence_state")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // -- dashboard coins --------------------------------------------------

    /// Replaces the entire coin list atomically.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn save_dashboard_coins(&self, coins: &[(String, bool)]) -> Result<()> {
        let added_at = to_epoch_seconds(Utc::now());
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM dashboard_coins").execute(&mut *tx).await?;
        for (symbol, active) in coins {
            sqlx::query("INSERT INTO dashboard_coins (symbol, active, added_at) VALUES (?, ?, ?)")
                .bind(symbol)
                .bind(active)
                .bind(added_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load_dashboard_coins(&self) -> Result<Vec<DashboardCoinRecord>> {
        let rows = sqlx::query_as::<_, DashboardCoinRecord>("SELECT * FROM dashboard_coins")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // -- hourly baselines ---------------------------------------------------

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn save_baseline(&self, symbol: &str, liq_volume: f64, trade_volume: f64) -> Result<()> {
        let recorded_at = to_epoch_seconds(Utc::now());
        sqlx::query(
            "INSERT INTO hourly_baselines (symbol, liq_volume, trade_volume, recorded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(liq_volume)
        .bind(trade_volume)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load_baselines(&self, symbol: &str, hours: i64) -> Result<Vec<HourlyBaselineRecord>> {
        let cutoff = to_epoch_seconds(Utc::now() - Duration::hours(hours));
        let rows = sqlx::query_as::<_, HourlyBaselineRecord>(
            "SELECT * FROM hourly_baselines WHERE symbol = ? AND recorded_at > ? ORDER BY recorded_at",
        )
        .bind(symbol)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes baselines older than `max_age_hours` (default 72, spec §4.13).
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn cleanup_old_baselines(&self, max_age_hours: Option<i64>) -> Result<u64> {
        let cutoff = to_epoch_seconds(
            Utc::now() - Duration::hours(max_age_hours.unwrap_or(DEFAULT_BASELINE_CLEANUP_HOURS)),
        );
        let result = sqlx::query("DELETE FROM hourly_baselines WHERE recorded_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -- OI snapshots -------------------------------------------------------

    /// # Errors
    /// Returns an error if the insert fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn save_oi_snapshot(
        &self,
        symbol: &str,
        current_oi_usd: f64,
        previous_oi_usd: Option<f64>,
        oi_high_usd: Option<f64>,
        oi_low_usd: Option<f64>,
        oi_change_pct: Option<f64>,
    ) -> Result<()> {
        let recorded_at = to_epoch_seconds(Utc::now());
        sqlx::query(
            "INSERT INTO oi_snapshots
               (symbol, current_oi_usd, previous_oi_usd, oi_high_usd, oi_low_usd,
                oi_change_pct, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(current_oi_usd)
        .bind(previous_oi_usd)
        .bind(oi_high_usd)
        .bind(oi_low_usd)
        .bind(oi_change_pct)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn oi_history(&self, symbol: &str, hours: i64) -> Result<Vec<OiSnapshotRecord>> {
        let cutoff = to_epoch_seconds(Utc::now() - Duration::hours(hours));
        let rows = sqlx::query_as::<_, OiSnapshotRecord>(
            "SELECT * FROM oi_snapshots WHERE symbol = ? AND recorded_at > ? ORDER BY recorded_at",
        )
        .bind(symbol)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes OI snapshots older than `max_age_hours` (default 168, spec §4.13).
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn cleanup_old_oi_snapshots(&self, max_age_hours: Option<i64>) -> Result<u64> {
        let cutoff = to_epoch_seconds(
            Utc::now() - Duration::hours(max_age_hours.unwrap_or(DEFAULT_SNAPSHOT_CLEANUP_HOURS)),
        );
        let result = sqlx::query("DELETE FROM oi_snapshots WHERE recorded_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -- funding snapshots ----------------------------------------------------

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn save_funding_snapshot(
        &self,
        symbol: &str,
        current_rate: f64,
        previous_rate: Option<f64>,
        rate_high: Option<f64>,
        rate_low: Option<f64>,
    ) -> Result<()> {
        let recorded_at = to_epoch_seconds(Utc::now());
        sqlx::query(
            "INSERT INTO funding_snapshots
               (symbol, current_rate, previous_rate, rate_high, rate_low, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(current_rate)
        .bind(previous_rate)
        .bind(rate_high)
        .bind(rate_low)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn funding_history(&self, symbol: &str, hours: i64) -> Result<Vec<FundingSnapshotRecord>> {
        let cutoff = to_epoch_seconds(Utc::now() - Duration::hours(hours));
        let rows = sqlx::query_as::<_, FundingSnapshotRecord>(
            "SELECT * FROM funding_snapshots WHERE symbol = ? AND recorded_at > ? ORDER BY recorded_at",
        )
        .bind(symbol)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes funding snapshots older than `max_age_hours` (default 168, spec §4.13).
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn cleanup_old_funding_snapshots(&self, max_age_hours: Option<i64>) -> Result<u64> {
        let cutoff = to_epoch_seconds(
            Utc::now() - Duration::hours(max_age_hours.unwrap_or(DEFAULT_SNAPSHOT_CLEANUP_HOURS)),
        );
        let result = sqlx::query("DELETE FROM funding_snapshots WHERE recorded_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Streams the hourly-baseline history as CSV, optionally filtered to
    /// one symbol (spec §6 `/api/export/baselines.csv`).
    ///
    /// # Errors
    /// Returns an error if the query or CSV encoding fails.
    pub async fn export_baselines_csv(&self, symbol: Option<&str>, limit: i64) -> Result<String> {
        let limit = limit.clamp(1, MAX_EXPORT_ROWS);
        let rows = if let Some(symbol) = symbol {
            sqlx::query_as::<_, HourlyBaselineRecord>(
                "SELECT * FROM hourly_baselines WHERE symbol = ? ORDER BY recorded_at DESC LIMIT ?",
            )
            .bind(symbol)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, HourlyBaselineRecord>(
                "SELECT * FROM hourly_baselines ORDER BY recorded_at DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        if rows.is_empty() {
            return Ok(String::new());
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["id", "symbol", "liq_volume", "trade_volume", "recorded_at"])?;
        for row in rows {
            writer.write_record(&[
                row.id.to_string(),
                row.symbol,
                row.liq_volume.to_string(),
                row.trade_volume.to_string(),
                format_epoch(row.recorded_at),
            ])?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn format_epoch(seconds: f64) -> String {
    DateTime::<Utc>::from_timestamp(seconds as i64, 0)
        .map_or_else(String::new, |ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        Store::connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn save_and_fetch_recent_signal() {
        let store = memory_store().await;
        let id = store
            .save_signal("BTCUSDT", "stop_hunt", "LONG", 82.0, Some(96_000.0), Some(95_600.0), Some(97_500.0), "{}")
            .await
            .unwrap();
        assert!(id > 0);
        let recent = store.recent_signals(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn update_outcome_reflects_in_stats() {
        let store = memory_store().await;
        let id = store
            .save_signal("ETHUSDT", "stop_hunt", "LONG", 80.0, None, None, None, "{}")
            .await
            .unwrap();
        store.update_signal_outcome(id, "WIN", 3500.0, 2.5).await.unwrap();
        let stats = store.signal_stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.wins, 1);
    }

    #[tokio::test]
    async fn dashboard_coins_replace_is_atomic() {
        let store = memory_store().await;
        store
            .save_dashboard_coins(&[("BTC".into(), true), ("ETH".into(), false)])
            .await
            .unwrap();
        let coins = store.load_dashboard_coins().await.unwrap();
        assert_eq!(coins.len(), 2);

        store.save_dashboard_coins(&[("SOL".into(), true)]).await.unwrap();
        let coins = store.load_dashboard_coins().await.unwrap();
        assert_eq!(coins.len(), 1);
        assert_eq!(coins[0].symbol, "SOL");
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_baselines() {
        let store = memory_store().await;
        store.save_baseline("BTCUSDT", 100.0, 200.0).await.unwrap();
        let removed = store.cleanup_old_baselines(Some(0)).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn export_csv_contains_header_and_row() {
        let store = memory_store().await;
        store
            .save_signal("BTCUSDT", "stop_hunt", "LONG", 82.0, None, None, None, "{}")
            .await
            .unwrap();
        let csv = store.export_signals_csv(10).await.unwrap();
        assert!(csv.starts_with("id,symbol"));
        assert!(csv.contains("BTCUSDT"));
    }

    #[tokio::test]
    async fn confidence_state_upserts_by_signal_type() {
        let store = memory_store().await;
        store.save_confidence_state("stop_hunt", 0.6, "[]").await.unwrap();
        store.save_confidence_state("stop_hunt", 0.65, "[true]").await.unwrap();
        let states = store.load_confidence_state().await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].win_rate, 0.65);
    }

    #[tokio::test]
    async fn export_baselines_csv_filters_by_symbol() {
        let store = memory_store().await;
        store.save_baseline("BTCUSDT", 100.0, 200.0).await.unwrap();
        store.save_baseline("ETHUSDT", 50.0, 70.0).await.unwrap();

        let all = store.export_baselines_csv(None, 10).await.unwrap();
        assert!(all.contains("BTCUSDT"));
        assert!(all.contains("ETHUSDT"));

        let filtered = store.export_baselines_csv(Some("BTCUSDT"), 10).await.unwrap();
        assert!(filtered.contains("BTCUSDT"));
        assert!(!filtered.contains("ETHUSDT"));
    }
}
