pub mod context_filter;
pub mod generator;
pub mod scorer;
pub mod validator;

pub use context_filter::{apply as apply_context_filter, FilterMode, FilterOutcome};
pub use generator::fuse;
pub use scorer::ConfidenceScorer;
pub use validator::{RejectionReason, SignalValidator};
