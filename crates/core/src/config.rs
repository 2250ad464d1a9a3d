//! Application configuration (spec §6 "Process" — config sections consumed).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub pairs: PairsConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub buffers: BuffersConfig,
    #[serde(default)]
    pub websocket: WebsocketConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub dashboard: DashboardConfig,
    pub storage: StorageConfig,
    pub coinglass: CoinglassConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairsConfig {
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
}

/// Per-tier (cascade_threshold, absorption_threshold) pairs in quote currency,
/// plus the large-order threshold used by order-flow/whale detectors (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub tier1_cascade: f64,
    pub tier1_absorption: f64,
    pub tier2_cascade: f64,
    pub tier2_absorption: f64,
    pub tier3_cascade: f64,
    pub tier3_absorption: f64,
    pub large_order_usd: f64,
    pub absorption_min_order_usd: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            tier1_cascade: 500_000.0,
            tier1_absorption: 300_000.0,
            tier2_cascade: 150_000.0,
            tier2_absorption: 100_000.0,
            tier3_cascade: 50_000.0,
            tier3_absorption: 30_000.0,
            large_order_usd: 10_000.0,
            absorption_min_order_usd: 5_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    pub min_confidence: f64,
    pub min_generator_confidence: f64,
    pub cooldown_minutes: i64,
    pub max_per_hour: usize,
    pub dedup_window_minutes: i64,
    pub cascade_window_s: u64,
    pub absorption_window_s: u64,
    pub order_flow_window_s: u64,
    pub volume_spike_window_s: u64,
    pub check_interval_seconds: i64,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            min_confidence: 65.0,
            min_generator_confidence: 65.0,
            cooldown_minutes: 5,
            max_per_hour: 20,
            dedup_window_minutes: 10,
            cascade_window_s: 30,
            absorption_window_s: 30,
            order_flow_window_s: 300,
            volume_spike_window_s: 60,
            check_interval_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub min_send_gap_ms: u64,
    pub send_timeout_s: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 500,
            max_retries: 3,
            min_send_gap_ms: 3_000,
            send_timeout_s: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuffersConfig {
    pub max_liquidations: usize,
    pub max_trades: usize,
    pub max_baseline_hours: usize,
    pub baseline_prune_age_hours: i64,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            max_liquidations: 1000,
            max_trades: 500,
            max_baseline_hours: 24,
            baseline_prune_age_hours: 72,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsocketConfig {
    pub url: String,
    pub api_key: String,
    pub heartbeat_interval_s: u64,
    pub read_timeout_s: u64,
    pub login_timeout_s: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_cap_ms: u64,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            url: "wss://example-upstream.invalid/ws".to_string(),
            api_key: String::new(),
            heartbeat_interval_s: 20,
            read_timeout_s: 60,
            login_timeout_s: 10,
            reconnect_base_ms: 1_000,
            reconnect_cap_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub mode: String,
    pub tier1_symbols: Vec<String>,
    pub tier2_symbols: Vec<String>,
    pub max_concurrent_analysis: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            mode: "normal".to_string(),
            tier1_symbols: vec!["BTCUSDT".into(), "ETHUSDT".into()],
            tier2_symbols: Vec::new(),
            max_concurrent_analysis: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub rest_poll_interval_s: u64,
    pub rest_poll_jitter_s: u64,
    pub rest_request_delay_s: f64,
    pub context_filter_mode: String,
    pub context_adjustment_enabled: bool,
    pub debounce_s: u64,
    pub discovered_symbol_liq_count: usize,
    pub discovered_symbol_window_s: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rest_poll_interval_s: 300,
            rest_poll_jitter_s: 10,
            rest_request_delay_s: 1.0,
            context_filter_mode: "normal".to_string(),
            context_adjustment_enabled: true,
            debounce_s: 5,
            discovered_symbol_liq_count: 3,
            discovered_symbol_window_s: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
    pub api_token: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinglassConfig {
    pub api_key: String,
    #[serde(default = "default_coinglass_base")]
    pub base_url: String,
}

fn default_coinglass_base() -> String {
    "https://open-api-v4.coinglass.com".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

/// Loads application configuration by merging `config/Config.toml` with
/// `APP_`-prefixed environment variable overrides, following the teacher
/// ancestor's figment-based `ConfigLoader`. Secrets (API keys, bot token)
/// are expected to arrive only via the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// # Errors
    /// Returns an error if the config file is missing required sections or
    /// fails to parse.
    pub fn load() -> anyhow::Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// # Errors
    /// Returns an error if the config file is missing required sections or
    /// fails to parse.
    pub fn load_from(path: &str) -> anyhow::Result<AppConfig> {
        use figment::providers::{Env, Format, Toml};
        use figment::Figment;

        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_default_is_descending_by_tier() {
        let t = ThresholdsConfig::default();
        assert!(t.tier1_cascade > t.tier2_cascade);
        assert!(t.tier2_cascade > t.tier3_cascade);
    }

    #[test]
    fn signals_default_min_confidence_matches_spec() {
        assert!((SignalsConfig::default().min_confidence - 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn load_from_missing_file_errors() {
        let result = ConfigLoader::load_from("does/not/exist/Config.toml");
        assert!(result.is_err());
    }
}
