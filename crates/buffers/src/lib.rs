pub mod context_buffer;
pub mod event_buffer;

pub use context_buffer::{
    AlignmentAssessment, CombinedAlignment, ContextBuffer, FundingAlignment, OiAlignment, Snapshot,
};
pub use event_buffer::{Baseline, BufferManager, HourlyBaseline};
