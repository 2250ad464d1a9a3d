//! Decodes raw stream frames into liquidation/trade events and classifies
//! system frames (login, ping/pong) per the wire schema in spec §6.

use cascadeguard_core::{
    EventValidationError, LiquidationEvent, LiquidationSide, Symbol, SymbolError, TradeEvent,
    TradeSide,
};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid symbol: {0}")]
    Symbol(#[from] SymbolError),
    #[error("invalid event: {0}")]
    Event(#[from] EventValidationError),
    #[error("missing or malformed field: {0}")]
    MissingField(&'static str),
}

/// What a decoded server frame turned out to be.
#[derive(Debug)]
pub enum FrameKind<'a> {
    LoginAck { success: bool },
    Pong,
    Liquidations(&'a Value),
    Trades(&'a Value),
    /// `ping`/`pong`/`login` echoes and anything else not carrying data.
    System,
}

/// Classifies a decoded frame by its `channel`/`event` fields (spec §4.12,
/// "silently ignore system frames").
#[must_use]
pub fn classify(frame: &Value) -> FrameKind<'_> {
    let event = frame.get("event").and_then(Value::as_str).unwrap_or("");
    if event == "login" {
        let success = frame.get("code").and_then(Value::as_i64) == Some(0);
        return FrameKind::LoginAck { success };
    }
    if event == "pong" {
        return FrameKind::Pong;
    }

    let channel = frame.get("channel").and_then(Value::as_str).unwrap_or("");
    if channel == "liquidationOrders" || event == "liquidationOrders" {
        if let Some(data) = frame.get("data") {
            return FrameKind::Liquidations(data);
        }
    }
    if channel.contains("futures_trades") {
        if let Some(data) = frame.get("data") {
            return FrameKind::Trades(data);
        }
    }
    FrameKind::System
}

/// Normalizes a `data` field (single object or array) into a slice of items.
#[must_use]
pub fn as_items(data: &Value) -> Vec<&Value> {
    match data {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn field_str<'a>(raw: &'a Value, field: &'static str) -> Result<&'a str, FrameError> {
    raw.get(field).and_then(Value::as_str).ok_or(FrameError::MissingField(field))
}

fn field_f64(raw: &Value, field: &'static str) -> Result<f64, FrameError> {
    raw.get(field).and_then(Value::as_f64).ok_or(FrameError::MissingField(field))
}

fn field_u8(raw: &Value, field: &'static str) -> Result<u8, FrameError> {
    raw.get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or(FrameError::MissingField(field))
}

fn field_i64(raw: &Value, field: &'static str) -> Result<i64, FrameError> {
    raw.get(field).and_then(Value::as_i64).ok_or(FrameError::MissingField(field))
}

/// Parses one liquidation item. Only `vol` is read for volume (spec §9 open
/// question 1 — the stale `volume_usd` alias is not accepted).
pub fn parse_liquidation(raw: &Value) -> Result<LiquidationEvent, FrameError> {
    let symbol = Symbol::parse(field_str(raw, "symbol")?)?;
    let exchange = field_str(raw, "exchange").unwrap_or("unknown").to_string();
    let price = field_f64(raw, "price")?;
    let side_raw = field_u8(raw, "side")?;
    let side = LiquidationSide::from_wire(side_raw)
        .ok_or(FrameError::Event(EventValidationError::UnknownSide(side_raw)))?;
    let vol = field_f64(raw, "vol")?;
    let timestamp_ms = field_i64(raw, "ts")?;

    let event = LiquidationEvent { symbol, exchange, price, side, vol, timestamp_ms };
    event.validate()?;
    Ok(event)
}

pub fn parse_trade(raw: &Value) -> Result<TradeEvent, FrameError> {
    let symbol = Symbol::parse(field_str(raw, "symbol")?)?;
    let exchange = field_str(raw, "exchange").unwrap_or("unknown").to_string();
    let price = field_f64(raw, "price")?;
    let side_raw = field_u8(raw, "side")?;
    let side = TradeSide::from_wire(side_raw)
        .ok_or(FrameError::Event(EventValidationError::UnknownSide(side_raw)))?;
    let vol = field_f64(raw, "vol")?;
    let timestamp_ms = field_i64(raw, "ts")?;

    let event = TradeEvent { symbol, exchange, price, side, vol, timestamp_ms };
    event.validate()?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_login_ack() {
        let frame = json!({"event": "login", "code": 0});
        assert!(matches!(classify(&frame), FrameKind::LoginAck { success: true }));
    }

    #[test]
    fn classifies_failed_login() {
        let frame = json!({"event": "login", "code": 1});
        assert!(matches!(classify(&frame), FrameKind::LoginAck { success: false }));
    }

    #[test]
    fn classifies_liquidation_channel() {
        let frame = json!({"channel": "liquidationOrders", "data": []});
        assert!(matches!(classify(&frame), FrameKind::Liquidations(_)));
    }

    #[test]
    fn classifies_trade_channel_by_prefix() {
        let frame = json!({"channel": "futures_trades@all_BTCUSDT@0", "data": []});
        assert!(matches!(classify(&frame), FrameKind::Trades(_)));
    }

    #[test]
    fn unrecognized_frame_is_system() {
        let frame = json!({"event": "subscribed"});
        assert!(matches!(classify(&frame), FrameKind::System));
    }

    #[test]
    fn parses_valid_liquidation() {
        let raw = json!({"symbol": "BTCUSDT", "exchange": "binance", "price": 96000.0, "side": 1, "vol": 50000.0, "ts": 1_700_000_000_000i64});
        let event = parse_liquidation(&raw).unwrap();
        assert_eq!(event.symbol.as_str(), "BTCUSDT");
        assert_eq!(event.side, LiquidationSide::Long);
    }

    #[test]
    fn rejects_missing_volume_field() {
        let raw = json!({"symbol": "BTCUSDT", "price": 1.0, "side": 1, "ts": 1});
        assert!(parse_liquidation(&raw).is_err());
    }

    #[test]
    fn ignores_stale_volume_usd_alias() {
        let raw = json!({"symbol": "BTCUSDT", "price": 1.0, "side": 1, "volume_usd": 500.0, "ts": 1});
        assert!(parse_liquidation(&raw).is_err());
    }
}
