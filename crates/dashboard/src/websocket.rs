//! Dashboard push socket (spec §4.11 C12, §6 `/ws`): reads an `auth` frame
//! within 5 s, then streams state-delta events until the client disconnects.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::state::{DashboardState, SubscriptionRequest};

const AUTH_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct AuthFrame {
    token: String,
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<DashboardState>>) -> Response {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

async fn handle_connection(mut socket: WebSocket, state: Arc<DashboardState>) {
    if !authenticate(&mut socket, &state).await {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let mut events = state.events.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else { break };
                let Ok(json) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(request) = serde_json::from_str::<SubscriptionRequest>(&text) {
                            state.enqueue_subscription(request);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    tracing::info!("dashboard websocket connection closed");
}

async fn authenticate(socket: &mut WebSocket, state: &DashboardState) -> bool {
    if state.auth_disabled() {
        return true;
    }
    let first_frame = tokio::time::timeout(AUTH_DEADLINE, socket.recv()).await;
    let Ok(Some(Ok(Message::Text(text)))) = first_frame else {
        tracing::warn!("dashboard websocket auth frame missing or timed out");
        return false;
    };
    match serde_json::from_str::<AuthFrame>(&text) {
        Ok(frame) if state.check_token(&frame.token) => true,
        _ => {
            tracing::warn!("dashboard websocket auth rejected");
            false
        }
    }
}
