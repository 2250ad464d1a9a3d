use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::DashboardState;
use crate::websocket;

/// Operator dashboard HTTP/WS bridge (spec §4.11 C12, §6).
pub struct ApiServer {
    state: Arc<DashboardState>,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: Arc<DashboardState>) -> Self {
        if state.auth_disabled() {
            tracing::warn!("dashboard auth disabled: no api_token configured");
        }
        Self { state }
    }

    #[must_use]
    pub fn state(&self) -> Arc<DashboardState> {
        self.state.clone()
    }

    /// Builds the router with all dashboard routes.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            .route("/", get(handlers::index))
            .route("/health", get(handlers::health))
            .route("/api/stats", get(handlers::stats))
            .route("/api/coins", get(handlers::coins))
            .route("/api/signals", get(handlers::signals))
            .route("/api/orderflow/:symbol", get(handlers::order_flow))
            .route("/api/coins/add", post(handlers::add_coin))
            .route("/api/coins/remove/:symbol", delete(handlers::remove_coin))
            .route("/api/coins/:symbol/toggle", patch(handlers::toggle_coin))
            .route("/api/export/signals.csv", get(handlers::export_signals_csv))
            .route("/api/export/baselines.csv", get(handlers::export_baselines_csv))
            .route("/api/stats/signals", get(handlers::stats_signals))
            .route("/api/signals/history", get(handlers::signals_history))
            .route("/ws", get(websocket::websocket_handler))
            .with_state(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Starts the dashboard server listening on `addr`.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind or serve requests.
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "dashboard listening");
        axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
            .await?;
        Ok(())
    }
}
