pub mod analysis;
pub mod background;
pub mod ingest;
pub mod state;
pub mod supervisor;
pub mod wire;

pub use state::{PendingTracked, Shared};
pub use supervisor::Supervisor;
