//! Liquidation and trade events as they cross the stream boundary (spec §3).

use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};

/// Side of a liquidation: which side of the book got forced out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LiquidationSide {
    /// A long position was liquidated (forced sell).
    Long = 1,
    /// A short position was liquidated (forced buy).
    Short = 2,
}

impl LiquidationSide {
    #[must_use]
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Long),
            2 => Some(Self::Short),
            _ => None,
        }
    }
}

/// Side of a trade print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TradeSide {
    /// Aggressive sell.
    Sell = 1,
    /// Aggressive buy.
    Buy = 2,
}

impl TradeSide {
    #[must_use]
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sell),
            2 => Some(Self::Buy),
            _ => None,
        }
    }
}

/// A liquidation print from the upstream firehose, immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub symbol: Symbol,
    pub exchange: String,
    pub price: f64,
    pub side: LiquidationSide,
    /// Volume denominated in quote currency.
    pub vol: f64,
    /// Server timestamp, milliseconds since epoch.
    pub timestamp_ms: i64,
}

/// A trade print from a per-symbol trades channel, immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: Symbol,
    pub exchange: String,
    pub price: f64,
    pub side: TradeSide,
    pub vol: f64,
    pub timestamp_ms: i64,
}

/// Errors raised validating a raw wire event before it is allowed into a buffer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventValidationError {
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
    #[error("price must be positive, got {0}")]
    NonPositivePrice(String),
    #[error("volume must be non-negative, got {0}")]
    NegativeVolume(String),
    #[error("unknown side value: {0}")]
    UnknownSide(u8),
}

impl LiquidationEvent {
    /// Validates field ranges per spec §3: price positive, volume non-negative.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        validate_price_vol(self.price, self.vol)
    }
}

impl TradeEvent {
    pub fn validate(&self) -> Result<(), EventValidationError> {
        validate_price_vol(self.price, self.vol)
    }
}

fn validate_price_vol(price: f64, vol: f64) -> Result<(), EventValidationError> {
    if !(price.is_finite() && price > 0.0) {
        return Err(EventValidationError::NonPositivePrice(price.to_string()));
    }
    if !(vol.is_finite() && vol >= 0.0) {
        return Err(EventValidationError::NegativeVolume(vol.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn liq(price: f64, vol: f64) -> LiquidationEvent {
        LiquidationEvent {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            exchange: "binance".into(),
            price,
            side: LiquidationSide::Long,
            vol,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn rejects_non_positive_price() {
        assert!(liq(0.0, 1.0).validate().is_err());
        assert!(liq(-1.0, 1.0).validate().is_err());
    }

    #[test]
    fn rejects_negative_volume() {
        assert!(liq(100.0, -1.0).validate().is_err());
    }

    #[test]
    fn accepts_zero_volume() {
        assert!(liq(100.0, 0.0).validate().is_ok());
    }

    #[test]
    fn side_from_wire_maps_correctly() {
        assert_eq!(LiquidationSide::from_wire(1), Some(LiquidationSide::Long));
        assert_eq!(LiquidationSide::from_wire(2), Some(LiquidationSide::Short));
        assert_eq!(LiquidationSide::from_wire(9), None);
        assert_eq!(TradeSide::from_wire(1), Some(TradeSide::Sell));
        assert_eq!(TradeSide::from_wire(2), Some(TradeSide::Buy));
    }
}
