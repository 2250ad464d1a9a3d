pub mod event_pattern;
pub mod order_flow;
pub mod stop_hunt;
pub mod tiering;

pub use tiering::{classify_tier, thresholds_for, whale_large_order_threshold, Tier, TierThresholds};
