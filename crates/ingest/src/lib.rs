pub mod frame;
pub mod heartbeat;
pub mod poller;
pub mod state;
pub mod stream;

pub use frame::{classify, parse_liquidation, parse_trade, FrameError, FrameKind};
pub use poller::{PollerStats, RestPoller};
pub use state::{Backoff, ConnectionState};
pub use stream::{ClientCommand, StreamClient, StreamHandle};
