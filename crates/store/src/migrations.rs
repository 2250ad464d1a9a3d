//! Schema creation (spec §6). Plain `CREATE TABLE IF NOT EXISTS` executed on
//! connect rather than a migration framework — the schema is small and fixed.

pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    signal_type TEXT NOT NULL,
    direction TEXT NOT NULL,
    confidence REAL NOT NULL,
    entry_price REAL,
    stop_loss REAL,
    target_price REAL,
    exit_price REAL,
    outcome TEXT,
    pnl_pct REAL,
    metadata_json TEXT NOT NULL,
    created_at REAL NOT NULL,
    checked_at REAL
);

CREATE TABLE IF NOT EXISTS confidence_state (
    signal_type TEXT PRIMARY KEY,
    win_rate REAL NOT NULL,
    history_json TEXT NOT NULL,
    updated_at REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS dashboard_coins (
    symbol TEXT PRIMARY KEY,
    active INTEGER NOT NULL DEFAULT 1,
    added_at REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS hourly_baselines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    liq_volume REAL NOT NULL,
    trade_volume REAL NOT NULL,
    recorded_at REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS oi_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    current_oi_usd REAL NOT NULL,
    previous_oi_usd REAL,
    oi_high_usd REAL,
    oi_low_usd REAL,
    oi_change_pct REAL,
    recorded_at REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS funding_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    current_rate REAL NOT NULL,
    previous_rate REAL,
    rate_high REAL,
    rate_low REAL,
    recorded_at REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_signals_symbol ON signals(symbol);
CREATE INDEX IF NOT EXISTS idx_signals_created ON signals(created_at);
CREATE INDEX IF NOT EXISTS idx_signals_outcome ON signals(outcome);
CREATE INDEX IF NOT EXISTS idx_baselines_symbol ON hourly_baselines(symbol);
CREATE INDEX IF NOT EXISTS idx_oi_symbol_recorded ON oi_snapshots(symbol, recorded_at);
CREATE INDEX IF NOT EXISTS idx_funding_symbol_recorded ON funding_snapshots(symbol, recorded_at);
";
