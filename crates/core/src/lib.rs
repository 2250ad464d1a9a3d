pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod signal;
pub mod symbol;

pub use clock::{MonotonicClock, SystemMonotonicClock, SystemWallClock, TestClock, WallClock};
pub use config::{AppConfig, ConfigLoader};
pub use error::{PipelineError, Result};
pub use events::{EventValidationError, LiquidationEvent, LiquidationSide, TradeEvent, TradeSide};
pub use signal::{
    BaselineContext, Direction, EventKind, EventSignal, FlowType, HuntDirection, Outcome,
    OrderFlowSignal, PriceZone, SignalMetadata, SignalType, StopHuntSignal, TrackedSignal,
    TradingSignal,
};
pub use symbol::{Symbol, SymbolError};
