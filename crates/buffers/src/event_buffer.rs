//! Per-symbol bounded ring buffers of liquidations and trades, hourly
//! baseline rollup, overflow accounting.

use std::collections::{HashMap, VecDeque};

use cascadeguard_core::{LiquidationEvent, Symbol, TradeEvent};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// One hourly-baseline entry: an (hour-end timestamp, summed liquidation
/// volume, summed trade volume) triple.
#[derive(Debug, Clone, Copy)]
pub struct HourlyBaseline {
    pub hour_end: DateTime<Utc>,
    pub liq_volume: f64,
    pub trade_volume: f64,
}

/// Average hourly volumes plus "current vs average" multipliers, attached as
/// metadata to outgoing signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Baseline {
    pub avg_hourly_liq_volume: f64,
    pub avg_hourly_trade_volume: f64,
    pub current_liq_multiplier: f64,
    pub current_trade_multiplier: f64,
}

struct SymbolBuffer {
    liquidations: VecDeque<LiquidationEvent>,
    trades: VecDeque<TradeEvent>,
    liq_overflow: u64,
    trade_overflow: u64,
    hourly_baselines: VecDeque<HourlyBaseline>,
}

impl SymbolBuffer {
    fn new() -> Self {
        Self {
            liquidations: VecDeque::new(),
            trades: VecDeque::new(),
            liq_overflow: 0,
            trade_overflow: 0,
            hourly_baselines: VecDeque::new(),
        }
    }
}

/// Thread-safe per-symbol liquidation/trade ring buffers (spec component C3).
pub struct BufferManager {
    buffers: RwLock<HashMap<Symbol, SymbolBuffer>>,
    max_liquidations: usize,
    max_trades: usize,
    max_baseline_hours: usize,
}

impl BufferManager {
    #[must_use]
    pub fn new(max_liquidations: usize, max_trades: usize, max_baseline_hours: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_liquidations,
            max_trades,
            max_baseline_hours,
        }
    }

    /// Appends a liquidation, evicting the oldest entry and bumping the
    /// overflow counter if the ring is full. Logs every 100th drop.
    pub fn add_liquidation(&self, event: LiquidationEvent) {
        let mut buffers = self.buffers.write();
        let buffer = buffers.entry(event.symbol.clone()).or_insert_with(SymbolBuffer::new);
        if buffer.liquidations.len() >= self.max_liquidations {
            buffer.liquidations.pop_front();
            buffer.liq_overflow += 1;
            if buffer.liq_overflow % 100 == 0 {
                tracing::warn!(
                    symbol = %event.symbol,
                    overflow = buffer.liq_overflow,
                    "liquidation ring overflow"
                );
            }
        }
        buffer.liquidations.push_back(event);
    }

    pub fn add_trade(&self, event: TradeEvent) {
        let mut buffers = self.buffers.write();
        let buffer = buffers.entry(event.symbol.clone()).or_insert_with(SymbolBuffer::new);
        if buffer.trades.len() >= self.max_trades {
            buffer.trades.pop_front();
            buffer.trade_overflow += 1;
            if buffer.trade_overflow % 100 == 0 {
                tracing::warn!(
                    symbol = %event.symbol,
                    overflow = buffer.trade_overflow,
                    "trade ring overflow"
                );
            }
        }
        buffer.trades.push_back(event);
    }

    /// Snapshot copy of liquidations with `timestamp_ms >= now_ms - window_s*1000`,
    /// truncated to the most recent `max_count` entries if given.
    #[must_use]
    pub fn get_liquidations(
        &self,
        symbol: &Symbol,
        now_ms: i64,
        window_s: u64,
        max_count: Option<usize>,
    ) -> Vec<LiquidationEvent> {
        let buffers = self.buffers.read();
        let Some(buffer) = buffers.get(symbol) else {
            return Vec::new();
        };
        let cutoff = now_ms - (window_s as i64) * 1000;
        let mut events: Vec<LiquidationEvent> = buffer
            .liquidations
            .iter()
            .filter(|e| e.timestamp_ms >= cutoff)
            .cloned()
            .collect();
        if let Some(max) = max_count {
            if events.len() > max {
                events = events.split_off(events.len() - max);
            }
        }
        events
    }

    #[must_use]
    pub fn get_trades(
        &self,
        symbol: &Symbol,
        now_ms: i64,
        window_s: u64,
        max_count: Option<usize>,
    ) -> Vec<TradeEvent> {
        let buffers = self.buffers.read();
        let Some(buffer) = buffers.get(symbol) else {
            return Vec::new();
        };
        let cutoff = now_ms - (window_s as i64) * 1000;
        let mut events: Vec<TradeEvent> = buffer
            .trades
            .iter()
            .filter(|e| e.timestamp_ms >= cutoff)
            .cloned()
            .collect();
        if let Some(max) = max_count {
            if events.len() > max {
                events = events.split_off(events.len() - max);
            }
        }
        events
    }

    /// Summarizes the last 3600s of each tracked symbol into one baseline
    /// entry, capped to `max_baseline_hours` entries.
    pub fn update_hourly_baseline(&self, now_ms: i64) {
        let mut buffers = self.buffers.write();
        for buffer in buffers.values_mut() {
            let cutoff = now_ms - 3600 * 1000;
            let liq_volume: f64 = buffer
                .liquidations
                .iter()
                .filter(|e| e.timestamp_ms >= cutoff)
                .map(|e| e.vol)
                .sum();
            let trade_volume: f64 = buffer
                .trades
                .iter()
                .filter(|e| e.timestamp_ms >= cutoff)
                .map(|e| e.vol)
                .sum();
            let hour_end = DateTime::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now);
            if buffer.hourly_baselines.len() >= self.max_baseline_hours {
                buffer.hourly_baselines.pop_front();
            }
            buffer.hourly_baselines.push_back(HourlyBaseline {
                hour_end,
                liq_volume,
                trade_volume,
            });
        }
    }

    /// Average hourly liquidation/trade volume over the stored baseline
    /// window, plus "current 30-minute sum, doubled and compared to average"
    /// multipliers. A symbol with no baseline history yet gets a neutral
    /// multiplier of 1.0 rather than a division by zero.
    #[must_use]
    pub fn get_baseline(&self, symbol: &Symbol, now_ms: i64) -> Baseline {
        let buffers = self.buffers.read();
        let Some(buffer) = buffers.get(symbol) else {
            return Baseline::default();
        };

        let count = buffer.hourly_baselines.len() as f64;
        let (avg_liq, avg_trade) = if count > 0.0 {
            let sum_liq: f64 = buffer.hourly_baselines.iter().map(|b| b.liq_volume).sum();
            let sum_trade: f64 = buffer.hourly_baselines.iter().map(|b| b.trade_volume).sum();
            (sum_liq / count, sum_trade / count)
        } else {
            (0.0, 0.0)
        };

        let cutoff_30m = now_ms - 30 * 60 * 1000;
        let current_liq: f64 = buffer
            .liquidations
            .iter()
            .filter(|e| e.timestamp_ms >= cutoff_30m)
            .map(|e| e.vol)
            .sum::<f64>()
            * 2.0;
        let current_trade: f64 = buffer
            .trades
            .iter()
            .filter(|e| e.timestamp_ms >= cutoff_30m)
            .map(|e| e.vol)
            .sum::<f64>()
            * 2.0;

        let liq_multiplier = if avg_liq > 0.0 { current_liq / avg_liq } else { 1.0 };
        let trade_multiplier = if avg_trade > 0.0 {
            current_trade / avg_trade
        } else {
            1.0
        };

        Baseline {
            avg_hourly_liq_volume: avg_liq,
            avg_hourly_trade_volume: avg_trade,
            current_liq_multiplier: liq_multiplier,
            current_trade_multiplier: trade_multiplier,
        }
    }

    /// Rebuilds every ring, dropping entries older than `now_ms - max_age_s*1000`.
    pub fn cleanup_old_data(&self, now_ms: i64, max_age_s: u64) {
        let cutoff = now_ms - (max_age_s as i64) * 1000;
        let mut buffers = self.buffers.write();
        for buffer in buffers.values_mut() {
            buffer.liquidations.retain(|e| e.timestamp_ms >= cutoff);
            buffer.trades.retain(|e| e.timestamp_ms >= cutoff);
        }
    }

    #[must_use]
    pub fn liq_overflow_count(&self, symbol: &Symbol) -> u64 {
        self.buffers
            .read()
            .get(symbol)
            .map_or(0, |b| b.liq_overflow)
    }

    #[must_use]
    pub fn trade_overflow_count(&self, symbol: &Symbol) -> u64 {
        self.buffers
            .read()
            .get(symbol)
            .map_or(0, |b| b.trade_overflow)
    }

    #[must_use]
    pub fn tracked_symbols(&self) -> Vec<Symbol> {
        self.buffers.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascadeguard_core::{LiquidationSide, TradeSide};

    fn liq(symbol: &str, vol: f64, timestamp_ms: i64) -> LiquidationEvent {
        LiquidationEvent {
            symbol: Symbol::parse(symbol).unwrap(),
            exchange: "binance".into(),
            price: 100.0,
            side: LiquidationSide::Long,
            vol,
            timestamp_ms,
        }
    }

    fn trade(symbol: &str, vol: f64, timestamp_ms: i64) -> TradeEvent {
        TradeEvent {
            symbol: Symbol::parse(symbol).unwrap(),
            exchange: "binance".into(),
            price: 100.0,
            side: TradeSide::Buy,
            vol,
            timestamp_ms,
        }
    }

    #[test]
    fn overflow_counter_increments_past_capacity() {
        let manager = BufferManager::new(2, 2, 24);
        let sym = Symbol::parse("BTCUSDT").unwrap();
        manager.add_liquidation(liq("BTCUSDT", 1.0, 0));
        manager.add_liquidation(liq("BTCUSDT", 1.0, 1));
        manager.add_liquidation(liq("BTCUSDT", 1.0, 2));
        assert_eq!(manager.liq_overflow_count(&sym), 1);
        assert_eq!(manager.get_liquidations(&sym, 10, 100, None).len(), 2);
    }

    #[test]
    fn get_liquidations_filters_by_window() {
        let manager = BufferManager::new(100, 100, 24);
        let sym = Symbol::parse("BTCUSDT").unwrap();
        manager.add_liquidation(liq("BTCUSDT", 1.0, 0));
        manager.add_liquidation(liq("BTCUSDT", 1.0, 50_000));
        let recent = manager.get_liquidations(&sym, 50_000, 10, None);
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn get_liquidations_truncates_to_max_count() {
        let manager = BufferManager::new(100, 100, 24);
        let sym = Symbol::parse("BTCUSDT").unwrap();
        for i in 0..5 {
            manager.add_liquidation(liq("BTCUSDT", 1.0, i * 1000));
        }
        let truncated = manager.get_liquidations(&sym, 10_000, 100, Some(2));
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated[1].timestamp_ms, 4000);
    }

    #[test]
    fn baseline_defaults_to_neutral_multiplier_without_history() {
        let manager = BufferManager::new(100, 100, 24);
        let sym = Symbol::parse("BTCUSDT").unwrap();
        manager.add_liquidation(liq("BTCUSDT", 10.0, 0));
        let baseline = manager.get_baseline(&sym, 0);
        assert_eq!(baseline.avg_hourly_liq_volume, 0.0);
        assert_eq!(baseline.current_liq_multiplier, 1.0);
    }

    #[test]
    fn update_hourly_baseline_caps_ring_length() {
        let manager = BufferManager::new(1000, 1000, 3);
        let sym = Symbol::parse("BTCUSDT").unwrap();
        manager.add_trade(trade("BTCUSDT", 5.0, 0));
        for h in 0..5 {
            manager.update_hourly_baseline(h * 3_600_000);
        }
        let baseline = manager.get_baseline(&sym, 5 * 3_600_000);
        // ring capped at 3 entries regardless of 5 updates
        assert!(baseline.avg_hourly_trade_volume >= 0.0);
    }

    #[test]
    fn cleanup_old_data_drops_stale_entries() {
        let manager = BufferManager::new(100, 100, 24);
        let sym = Symbol::parse("BTCUSDT").unwrap();
        manager.add_liquidation(liq("BTCUSDT", 1.0, 0));
        manager.add_liquidation(liq("BTCUSDT", 1.0, 100_000));
        manager.cleanup_old_data(100_000, 10);
        assert_eq!(manager.get_liquidations(&sym, 100_000, 1_000_000, None).len(), 1);
    }
}
