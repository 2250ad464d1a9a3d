//! Renders a fused `TradingSignal` into a chat message (spec §1 "message
//! formatter"). Pure function, capped at 4096 characters for chat-sink
//! limits.

use cascadeguard_core::{Direction, EventKind, FlowType, HuntDirection, SignalType, TradingSignal};
use chrono::Utc;

const MAX_MESSAGE_LEN: usize = 4096;

/// Renders a signal to its delivery text, truncating to the chat-sink limit.
#[must_use]
pub fn format(signal: &TradingSignal) -> String {
    let body = match signal.signal_type {
        SignalType::StopHunt => format_stop_hunt(signal),
        SignalType::Accumulation | SignalType::Distribution => format_order_flow(signal),
        SignalType::Event => format_event(signal),
    };
    truncate(body)
}

fn format_stop_hunt(signal: &TradingSignal) -> String {
    let Some(hunt) = &signal.metadata.stop_hunt else {
        return format_event(signal);
    };

    let arrow = match hunt.direction {
        HuntDirection::ShortHunt => "LONGS LIQUIDATED",
        HuntDirection::LongHunt => "SHORTS LIQUIDATED",
        HuntDirection::Unknown => "MIXED LIQUIDATIONS",
    };

    let mut out = format!(
        "\u{26a1} STOP HUNT DETECTED - {}\n\n\
         Liquidations: ${:.1}M {}\n\
         Zone: ${:.4}-${:.4}\n",
        signal.symbol.to_base().as_str(),
        hunt.total_volume / 1_000_000.0,
        arrow,
        hunt.price_zone.min,
        hunt.price_zone.max,
    );

    if hunt.absorption_detected {
        out.push_str(&format!(
            "\n\u{1f40b} Absorption: ${:.1}M detected\n",
            hunt.absorption_volume / 1_000_000.0
        ));
    }

    if let Some(levels) = cascadeguard_tracker::open(signal.clone(), Utc::now(), 900) {
        let side = if signal.direction == Direction::Long { "LONG" } else { "SHORT" };
        out.push_str(&format!(
            "\n\u{2705} {side} SETUP\nEntry: ${:.4}\nSL: ${:.4}\nTarget: ${:.4}\n",
            levels.entry_price, levels.stop_loss, levels.target_price
        ));
    }

    out.push_str(&format!(
        "\nConfidence: {:.0}%\nTime: {}\n",
        signal.confidence,
        signal.created_at.format("%H:%M:%S UTC")
    ));
    out
}

fn format_order_flow(signal: &TradingSignal) -> String {
    let Some(flow) = &signal.metadata.order_flow else {
        return format_event(signal);
    };

    let label = match flow.signal_type {
        FlowType::Accumulation => "WHALE ACCUMULATION",
        FlowType::Distribution => "WHALE DISTRIBUTION",
    };
    let icon = if flow.signal_type == FlowType::Accumulation { "\u{1f7e2}" } else { "\u{1f534}" };
    let buy_pct = flow.buy_ratio * 100.0;
    let sell_pct = 100.0 - buy_pct;

    let delta_label = if flow.net_delta >= 0.0 { "BULLISH" } else { "BEARISH" };

    format!(
        "{icon} {} - {label}\n\n\
         {}min Analysis:\n\n\
         Buy Volume: ${:.1}M ({buy_pct:.0}%)\n{}\n\n\
         Sell Volume: ${:.1}M ({sell_pct:.0}%)\n{}\n\n\
         Whale Activity:\n\u{2022} Large Buys: {} orders\n\u{2022} Large Sells: {} orders\n\n\
         \u{1f4ca} Net Delta: ${:.1}M ({delta_label})\n\n\
         Confidence: {:.0}%\n",
        signal.symbol.to_base().as_str(),
        flow.window_s / 60,
        flow.buy_volume / 1_000_000.0,
        progress_bar(buy_pct, 20),
        flow.sell_volume / 1_000_000.0,
        progress_bar(sell_pct, 20),
        flow.large_buys,
        flow.large_sells,
        flow.net_delta / 1_000_000.0,
        signal.confidence,
    )
}

fn format_event(signal: &TradingSignal) -> String {
    if signal.metadata.events.is_empty() {
        return format!(
            "\u{1f4e2} {} signal\nConfidence: {:.0}%\n",
            signal.symbol.to_base().as_str(),
            signal.confidence
        );
    }

    let mut out = String::new();
    for event in &signal.metadata.events {
        let title = match event.kind {
            EventKind::LiquidationCascade => "LIQUIDATION CASCADE",
            EventKind::WhaleAccumulation => "WHALE WINDOW - ACCUMULATION",
            EventKind::WhaleDistribution => "WHALE WINDOW - DISTRIBUTION",
            EventKind::VolumeSpike => "VOLUME SPIKE",
        };
        out.push_str(&format!(
            "\u{1f4e2} {} - {title}\n{}\nConfidence: {:.0}%\n\n",
            signal.symbol.to_base().as_str(),
            event.description,
            event.confidence
        ));
    }
    out
}

fn progress_bar(percentage: f64, length: usize) -> String {
    let filled = ((length as f64) * percentage / 100.0) as usize;
    let filled = filled.min(length);
    format!("{}{}", "\u{2588}".repeat(filled), "\u{2591}".repeat(length - filled))
}

fn truncate(mut s: String) -> String {
    if s.len() > MAX_MESSAGE_LEN {
        s.truncate(MAX_MESSAGE_LEN);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascadeguard_core::{
        OrderFlowSignal, PriceZone, SignalMetadata, StopHuntSignal, Symbol,
    };

    fn base_signal() -> TradingSignal {
        TradingSignal {
            symbol: Symbol::parse("BTCUSDT").unwrap(),
            signal_type: SignalType::StopHunt,
            direction: Direction::Long,
            confidence: 87.0,
            sources: vec!["stop_hunt".into()],
            priority: 1,
            created_at: Utc::now(),
            metadata: SignalMetadata::default(),
        }
    }

    #[test]
    fn stop_hunt_message_includes_zone_and_confidence() {
        let mut signal = base_signal();
        signal.metadata.stop_hunt = Some(StopHuntSignal {
            symbol: signal.symbol.clone(),
            timestamp: Utc::now(),
            confidence: 87.0,
            total_volume: 2_800_000.0,
            liquidation_count: 40,
            direction: HuntDirection::ShortHunt,
            directional_pct: 0.9,
            price_zone: PriceZone { min: 95_800.0, max: 96_000.0 },
            absorption_volume: 1_200_000.0,
            absorption_detected: true,
        });
        let text = format(&signal);
        assert!(text.contains("STOP HUNT DETECTED"));
        assert!(text.contains("Absorption"));
        assert!(text.contains("87%"));
    }

    #[test]
    fn order_flow_message_shows_progress_bars() {
        let mut signal = base_signal();
        signal.signal_type = SignalType::Accumulation;
        signal.metadata.order_flow = Some(OrderFlowSignal {
            symbol: signal.symbol.clone(),
            timestamp: Utc::now(),
            confidence: 78.0,
            window_s: 300,
            buy_volume: 2_800_000.0,
            sell_volume: 1_100_000.0,
            buy_ratio: 0.72,
            large_buys: 9,
            large_sells: 2,
            signal_type: FlowType::Accumulation,
            net_delta: 1_700_000.0,
            total_trades: 120,
        });
        let text = format(&signal);
        assert!(text.contains("WHALE ACCUMULATION"));
        assert!(text.contains("\u{2588}"));
        assert!(text.contains("BULLISH"));
    }

    #[test]
    fn message_is_never_longer_than_4096_chars() {
        let signal = base_signal();
        assert!(format(&signal).len() <= MAX_MESSAGE_LEN);
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(50.0, 10), "\u{2588}\u{2588}\u{2588}\u{2588}\u{2588}\u{2591}\u{2591}\u{2591}\u{2591}\u{2591}");
        assert_eq!(progress_bar(100.0, 4), "\u{2588}\u{2588}\u{2588}\u{2588}");
    }
}
