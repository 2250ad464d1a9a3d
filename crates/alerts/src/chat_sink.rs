//! Telegram chat-sink client (spec §6 "Chat sink"): HTTP POST with a
//! client-side minimum inter-send gap and a bounded exponential-backoff
//! retry, grounded on the `TelegramBot` stub in the original source.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::json;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TEXT_LEN: usize = 4096;
const RETRY_DELAYS_MS: [u64; 3] = [1_000, 2_000, 4_000];

/// Sends formatted alert text to a Telegram chat, enforcing the sink's own
/// rate limit and retrying transient failures before giving up.
pub struct TelegramSink {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
    min_send_gap: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl TelegramSink {
    #[must_use]
    pub fn new(bot_token: String, chat_id: String, min_send_gap: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            bot_token,
            chat_id,
            min_send_gap,
            last_send: Mutex::new(None),
        }
    }

    async fn throttle(&self) {
        let wait = {
            let last = self.last_send.lock().unwrap();
            last.map(|t| self.min_send_gap.saturating_sub(t.elapsed()))
        };
        if let Some(wait) = wait {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }

    async fn send_once(&self, text: &str) -> anyhow::Result<()> {
        self.throttle().await;
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = json!({
            "chat_id": self.chat_id,
            "text": truncate(text),
            "parse_mode": "Markdown",
        });
        let result = self.client.post(url).json(&body).send().await;
        *self.last_send.lock().unwrap() = Some(Instant::now());
        let response = result?;
        if response.status().is_success() {
            Ok(())
        } else {
            anyhow::bail!("chat sink returned {}", response.status())
        }
    }

    /// Sends with up to three retries (1s, 2s, 4s backoff) before giving up.
    ///
    /// # Errors
    /// Returns the last transport error if every attempt fails.
    pub async fn send_with_retry(&self, text: &str) -> anyhow::Result<()> {
        let mut attempt = 0usize;
        loop {
            match self.send_once(text).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < RETRY_DELAYS_MS.len() => {
                    tracing::warn!(attempt, error = %err, "chat sink send failed, retrying");
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAYS_MS[attempt])).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_LEN {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(MAX_TEXT_LEN - 1).collect();
        out.push('\u{2026}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate("hello"), "hello");
    }

    #[test]
    fn long_text_truncates_with_ellipsis() {
        let long = "a".repeat(5000);
        let out = truncate(&long);
        assert_eq!(out.chars().count(), MAX_TEXT_LEN);
        assert!(out.ends_with('\u{2026}'));
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_waits_for_min_gap() {
        let sink = TelegramSink::new("token".into(), "chat".into(), Duration::from_millis(100));
        *sink.last_send.lock().unwrap() = Some(Instant::now());
        let start = tokio::time::Instant::now();
        sink.throttle().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
