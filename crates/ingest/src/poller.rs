//! CoinGlass-style REST poller for open interest and funding rate context
//! (spec §4.2 C2). Polls on a 5-minute cadence with jitter, serially per
//! symbol to respect rate limits, and feeds results straight into a
//! [`ContextBuffer`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use cascadeguard_buffers::context_buffer::{ContextBuffer, Snapshot};
use cascadeguard_core::Symbol;
use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::watch;

const BASE_URL: &str = "https://open-api-v4.coinglass.com";
const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(300);
const MAX_JITTER_SECS: u64 = 10;

#[derive(Debug, Default, Clone, Copy)]
pub struct PollerStats {
    pub polls_completed: u64,
    pub oi_fetches: u64,
    pub funding_fetches: u64,
    pub errors: u64,
}

#[derive(Debug, Deserialize)]
struct Candle {
    high: String,
    low: String,
    close: String,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    code: String,
    #[serde(default)]
    data: Vec<Candle>,
}

pub struct RestPoller {
    client: reqwest::Client,
    api_key: String,
    symbols: RwLock<Vec<Symbol>>,
    poll_interval: StdDuration,
    request_delay: StdDuration,
    context: Arc<ContextBuffer>,
    stats: RwLock<PollerStats>,
}

impl RestPoller {
    /// # Errors
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(
        api_key: String,
        symbols: Vec<Symbol>,
        context: Arc<ContextBuffer>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            symbols: RwLock::new(symbols),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_delay: StdDuration::from_millis(500),
            context,
            stats: RwLock::new(PollerStats::default()),
        })
    }

    pub fn update_symbols(&self, new_symbols: Vec<Symbol>) {
        let mut symbols = self.symbols.write();
        let mut added = Vec::new();
        for symbol in new_symbols {
            if !symbols.contains(&symbol) {
                added.push(symbol.clone());
                symbols.push(symbol);
            }
        }
        if !added.is_empty() {
            tracing::info!(count = added.len(), "added symbols to rest poller");
        }
    }

    #[must_use]
    pub fn stats(&self) -> PollerStats {
        *self.stats.read()
    }

    /// Runs the poll loop until `shutdown` fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(symbols = self.symbols.read().len(), "rest poller started");
        while !*shutdown.borrow() {
            self.poll_all().await;
            self.stats.write().polls_completed += 1;

            let jitter = rand::thread_rng().gen_range(0..=MAX_JITTER_SECS);
            let wait = self.poll_interval + StdDuration::from_secs(jitter);
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("rest poller stopped");
    }

    async fn poll_all(&self) {
        let symbols = self.symbols.read().clone();
        for symbol in symbols {
            if let Some(snapshot) = self.fetch_candles(&symbol, "open-interest/aggregated-history").await {
                self.context.add_oi_snapshot(symbol.clone(), snapshot);
                self.stats.write().oi_fetches += 1;
            }
            tokio::time::sleep(self.request_delay / 2).await;

            if let Some(snapshot) = self.fetch_candles(&symbol, "funding-rate/oi-weight-history").await {
                self.context.add_funding_snapshot(symbol.clone(), snapshot);
                self.stats.write().funding_fetches += 1;
            }
            tokio::time::sleep(self.request_delay).await;
        }
    }

    async fn fetch_candles(&self, symbol: &Symbol, path: &str) -> Option<Snapshot> {
        let url = format!("{BASE_URL}/api/futures/{path}");
        let result = self
            .client
            .get(&url)
            .header("CG-API-KEY", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("symbol", symbol.as_str()), ("interval", "1h"), ("limit", "2")])
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(err) => {
                self.stats.write().errors += 1;
                tracing::warn!(%symbol, error = %err, "rest poll request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            self.stats.write().errors += 1;
            tracing::warn!(%symbol, status = %response.status(), "rest poll http error");
            return None;
        }

        let parsed: CandleResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                self.stats.write().errors += 1;
                tracing::warn!(%symbol, error = %err, "rest poll decode failed");
                return None;
            }
        };

        if parsed.code != "0" {
            self.stats.write().errors += 1;
            tracing::warn!(%symbol, code = %parsed.code, "rest poll api error");
            return None;
        }

        let latest = parsed.data.last()?;
        let previous = if parsed.data.len() >= 2 {
            &parsed.data[parsed.data.len() - 2]
        } else {
            latest
        };

        Some(Snapshot {
            current: latest.close.parse().unwrap_or(0.0),
            previous: previous.close.parse().unwrap_or(0.0),
            high: latest.high.parse().unwrap_or(0.0),
            low: latest.low.parse().unwrap_or(0.0),
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_response_parses_success_envelope() {
        let raw = r#"{"code":"0","msg":"success","data":[{"time":1,"open":"1","high":"2","low":"0.5","close":"1.5"}]}"#;
        let parsed: CandleResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.code, "0");
        assert_eq!(parsed.data[0].close, "1.5");
    }

    #[test]
    fn candle_response_tolerates_missing_data() {
        let raw = r#"{"code":"1","msg":"bad symbol"}"#;
        let parsed: CandleResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.data.is_empty());
    }
}
