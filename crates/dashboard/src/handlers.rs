//! REST handlers for the operator dashboard surface (spec §6 "Dashboard HTTP").

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::{DashboardState, Stats};

pub type SharedState = Arc<DashboardState>;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Authenticates a write/export request.
fn require_auth(state: &DashboardState, headers: &HeaderMap) -> Result<(), StatusCode> {
    if state.auth_disabled() {
        return Ok(());
    }
    match bearer_token(headers) {
        None => Err(StatusCode::UNAUTHORIZED),
        Some(token) if state.check_token(token) => Ok(()),
        Some(_) => Err(StatusCode::FORBIDDEN),
    }
}

/// Enforces the 30 req/min/IP limit on read and write endpoints alike.
fn require_rate_limit(state: &DashboardState, addr: SocketAddr) -> Result<(), StatusCode> {
    if state.check_rate_limit(addr.ip()) {
        Ok(())
    } else {
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

pub async fn index(State(state): State<SharedState>) -> Html<String> {
    let token = if state.auth_disabled() { String::new() } else { state.api_token.clone() };
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta name=\"dashboard-token\" content=\"{token}\">\
         <title>cascadeguard</title></head>\
         <body><div id=\"app\">cascadeguard operator console</div></body></html>"
    ))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: i64,
    pub coins_tracked: usize,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
        coins_tracked: state.coins_snapshot().len(),
    })
}

pub async fn stats(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Json<Stats>, StatusCode> {
    require_rate_limit(&state, addr)?;
    Ok(Json(state.stats_snapshot()))
}

pub async fn coins(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_rate_limit(&state, addr)?;
    Ok(Json(json!({ "coins": state.coins_snapshot() })))
}

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    limit: Option<usize>,
}

pub async fn signals(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<SignalsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_rate_limit(&state, addr)?;
    let limit = query.limit.unwrap_or(50).min(200);
    Ok(Json(json!({ "signals": state.recent_signals(limit) })))
}

pub async fn order_flow(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(symbol): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_rate_limit(&state, addr)?;
    let flow = state.order_flow(&symbol);
    Ok(Json(json!({ "symbol": symbol, "flow": flow })))
}

#[derive(Debug, Deserialize)]
pub struct AddCoinRequest {
    pub symbol: String,
}

pub async fn add_coin(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<AddCoinRequest>,
) -> Result<StatusCode, StatusCode> {
    require_rate_limit(&state, addr)?;
    require_auth(&state, &headers)?;
    state.add_coin(&req.symbol).ok_or(StatusCode::BAD_REQUEST)?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_coin(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(symbol): Path<String>,
) -> Result<StatusCode, StatusCode> {
    require_rate_limit(&state, addr)?;
    require_auth(&state, &headers)?;
    if state.remove_coin(&symbol) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleCoinRequest {
    pub active: bool,
}

pub async fn toggle_coin(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(symbol): Path<String>,
    Json(req): Json<ToggleCoinRequest>,
) -> Result<StatusCode, StatusCode> {
    require_rate_limit(&state, addr)?;
    require_auth(&state, &headers)?;
    if state.toggle_coin(&symbol, req.active) {
        Ok(StatusCode::OK)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

pub async fn export_signals_csv(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    require_auth(&state, &headers)?;
    let csv = state
        .store
        .export_signals_csv(5000)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"signals.csv\""),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct BaselinesExportQuery {
    symbol: Option<String>,
}

pub async fn export_baselines_csv(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<BaselinesExportQuery>,
) -> Result<Response, StatusCode> {
    require_auth(&state, &headers)?;
    let csv = state
        .store
        .export_baselines_csv(query.symbol.as_deref(), 5000)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"baselines.csv\""),
        ],
        csv,
    )
        .into_response())
}

pub async fn stats_signals(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_auth(&state, &headers)?;
    let aggregate =
        state.store.signal_stats().await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let by_type = state
        .store
        .signal_stats_by_type()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "aggregate": aggregate, "by_type": by_type })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    symbol: Option<String>,
    limit: Option<i64>,
}

pub async fn signals_history(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_auth(&state, &headers)?;
    let limit = query.limit.unwrap_or(200).clamp(1, 5000);
    let rows = if let Some(symbol) = query.symbol.as_deref() {
        state.store.signals_by_symbol(symbol, limit).await
    } else {
        state.store.recent_signals(limit).await
    }
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "signals": rows })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_strips_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn bearer_token_absent_without_header() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
    }
}
