pub mod chat_sink;
pub mod formatter;
pub mod queue;

pub use chat_sink::TelegramSink;
pub use formatter::format;
pub use queue::{AlertQueue, QueueStats, QueuedAlert};
