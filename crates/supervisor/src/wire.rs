//! String/channel conversions at the store and exchange boundaries
//! (spec §4.12). Kept separate so `analysis.rs` and `background.rs` don't
//! each reinvent the signal-type/direction string conventions.

use cascadeguard_core::{AppConfig, Direction, SignalType, Symbol};

/// Lowercase snake-case signal-type string, matching the store's fixtures
/// (`"stop_hunt"`, not `"StopHunt"`).
#[must_use]
pub fn signal_type_str(signal_type: SignalType) -> &'static str {
    match signal_type {
        SignalType::StopHunt => "stop_hunt",
        SignalType::Accumulation => "accumulation",
        SignalType::Distribution => "distribution",
        SignalType::Event => "event",
    }
}

#[must_use]
pub fn parse_signal_type(raw: &str) -> Option<SignalType> {
    match raw {
        "stop_hunt" => Some(SignalType::StopHunt),
        "accumulation" => Some(SignalType::Accumulation),
        "distribution" => Some(SignalType::Distribution),
        "event" => Some(SignalType::Event),
        _ => None,
    }
}

/// Uppercase direction string, matching the store's fixtures (`"LONG"`).
#[must_use]
pub fn direction_str(direction: Direction) -> &'static str {
    match direction {
        Direction::Long => "LONG",
        Direction::Short => "SHORT",
        Direction::Neutral => "NEUTRAL",
    }
}

/// Exchange trade-channel name for a base/quote pair, e.g. `BTCUSDT` ->
/// `futures_trades@all_BTCUSDT@0`.
#[must_use]
pub fn trades_channel(symbol: &Symbol) -> String {
    format!("futures_trades@all_{}@0", symbol.as_str())
}

/// Every symbol named in the tier1/tier2 monitoring lists, parsed and
/// deduplicated. Unparsable entries are skipped with a warning rather than
/// failing startup.
#[must_use]
pub fn configured_symbols(config: &AppConfig) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for raw in config
        .monitoring
        .tier1_symbols
        .iter()
        .chain(config.monitoring.tier2_symbols.iter())
    {
        match Symbol::parse(raw) {
            Ok(symbol) => {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
            Err(err) => tracing::warn!(symbol = %raw, error = %err, "skipping unparsable configured symbol"),
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_type_round_trips() {
        for signal_type in [
            SignalType::StopHunt,
            SignalType::Accumulation,
            SignalType::Distribution,
            SignalType::Event,
        ] {
            let raw = signal_type_str(signal_type);
            assert_eq!(parse_signal_type(raw), Some(signal_type));
        }
    }

    #[test]
    fn unknown_signal_type_string_parses_to_none() {
        assert_eq!(parse_signal_type("bogus"), None);
    }

    #[test]
    fn trades_channel_wraps_symbol() {
        let symbol = Symbol::parse("BTCUSDT").unwrap();
        assert_eq!(trades_channel(&symbol), "futures_trades@all_BTCUSDT@0");
    }

    #[test]
    fn direction_strings_are_uppercase() {
        assert_eq!(direction_str(Direction::Long), "LONG");
        assert_eq!(direction_str(Direction::Short), "SHORT");
    }
}
