//! Symbol parsing and the pair/base conversion used throughout the pipeline.

use std::fmt;

const QUOTE_SUFFIXES: &[&str] = &["USDT", "USDC", "BUSD", "USD"];

/// A validated exchange symbol, `^[A-Z0-9]{3,20}$`.
///
/// Two views coexist on the same identifier family: the *pair* symbol used on the
/// stream (e.g. `BTCUSDT`) and the *base* symbol used by the REST poller (`BTC`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Symbol(String);

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("symbol '{0}' does not match ^[A-Z0-9]{{3,20}}$")]
    InvalidFormat(String),
}

impl Symbol {
    /// Parses and validates a symbol. Rejects anything not matching
    /// `^[A-Z0-9]{3,20}$`.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let len_ok = (3..=20).contains(&raw.len());
        let chars_ok = !raw.is_empty()
            && raw
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if len_ok && chars_ok {
            Ok(Self(raw.to_string()))
        } else {
            Err(SymbolError::InvalidFormat(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts a pair symbol (e.g. `BTCUSDT`) to its base symbol (`BTC`) by
    /// stripping one known quote suffix. Deterministic: the first matching
    /// suffix in `QUOTE_SUFFIXES` wins, and returns the unchanged symbol when
    /// none match (already a base symbol, or an unrecognized quote asset).
    #[must_use]
    pub fn to_base(&self) -> Self {
        for suffix in QUOTE_SUFFIXES {
            if let Some(stripped) = self.0.strip_suffix(suffix) {
                if stripped.len() >= 2 {
                    return Self(stripped.to_string());
                }
            }
        }
        self.clone()
    }

    /// Converts a base symbol to a pair symbol against the given quote asset
    /// (defaults to `USDT`, the stream's native quote).
    #[must_use]
    pub fn to_pair(&self, quote: &str) -> Self {
        if QUOTE_SUFFIXES.iter().any(|q| self.0.ends_with(q)) {
            self.clone()
        } else {
            Self(format!("{}{quote}", self.0))
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = SymbolError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_pair_symbol() {
        assert!(Symbol::parse("BTCUSDT").is_ok());
    }

    #[test]
    fn rejects_lowercase() {
        assert!(Symbol::parse("btcusdt").is_err());
    }

    #[test]
    fn rejects_too_short() {
        assert!(Symbol::parse("BT").is_err());
    }

    #[test]
    fn rejects_too_long() {
        assert!(Symbol::parse(&"A".repeat(21)).is_err());
    }

    #[test]
    fn rejects_punctuation() {
        assert!(Symbol::parse("BTC-USDT").is_err());
    }

    #[test]
    fn base_strips_usdt() {
        let s = Symbol::parse("BTCUSDT").unwrap();
        assert_eq!(s.to_base().as_str(), "BTC");
    }

    #[test]
    fn base_strips_usdc() {
        let s = Symbol::parse("ETHUSDC").unwrap();
        assert_eq!(s.to_base().as_str(), "ETH");
    }

    #[test]
    fn base_strips_busd() {
        let s = Symbol::parse("SOLBUSD").unwrap();
        assert_eq!(s.to_base().as_str(), "SOL");
    }

    #[test]
    fn base_unchanged_when_no_known_suffix() {
        let s = Symbol::parse("BTC").unwrap();
        assert_eq!(s.to_base().as_str(), "BTC");
    }

    #[test]
    fn to_pair_appends_quote() {
        let s = Symbol::parse("BTC").unwrap();
        assert_eq!(s.to_pair("USDT").as_str(), "BTCUSDT");
    }

    #[test]
    fn to_pair_idempotent_on_pair_symbol() {
        let s = Symbol::parse("BTCUSDT").unwrap();
        assert_eq!(s.to_pair("USDT").as_str(), "BTCUSDT");
    }
}
