pub mod handlers;
pub mod server;
pub mod state;
pub mod websocket;

pub use server::ApiServer;
pub use state::{CoinEntry, DashboardEvent, DashboardState, OrderFlowSnapshot, SignalSummary, Stats, SubscriptionAction, SubscriptionRequest};
