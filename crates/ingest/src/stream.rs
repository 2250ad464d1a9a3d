//! Upstream push-stream client (spec §4.1 C1).
//!
//! Owns one WebSocket session: login, heartbeat, subscribe/unsubscribe,
//! and capped-exponential-backoff reconnect. Decoded frames are handed to
//! the caller over an `mpsc` channel so the read loop never blocks on a
//! detector or any other slow consumer.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::heartbeat::HeartbeatTimer;
use crate::state::{Backoff, ConnectionState};

const LOGIN_DEADLINE: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
pub enum ClientCommand {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
}

/// Lightweight handle callers use to drive a running `StreamClient`.
#[derive(Clone)]
pub struct StreamHandle {
    commands: mpsc::Sender<ClientCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl StreamHandle {
    /// # Errors
    /// Returns an error if the client task has already exited.
    pub async fn subscribe(&self, channels: Vec<String>) -> anyhow::Result<()> {
        self.commands.send(ClientCommand::Subscribe(channels)).await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the client task has already exited.
    pub async fn unsubscribe(&self, channels: Vec<String>) -> anyhow::Result<()> {
        self.commands.send(ClientCommand::Unsubscribe(channels)).await?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

pub struct StreamClient {
    ws_url: String,
    api_key: String,
    heartbeat_interval: Duration,
}

impl StreamClient {
    #[must_use]
    pub fn new(ws_url: String, api_key: String, heartbeat_interval: Duration) -> Self {
        Self { ws_url, api_key, heartbeat_interval }
    }

    /// Spawns the connect/read/reconnect loop as a background task. Decoded
    /// frames are sent to `frame_tx`; `shutdown` set to `true` stops the loop.
    pub fn spawn(
        self,
        frame_tx: mpsc::Sender<Value>,
        shutdown: watch::Receiver<bool>,
    ) -> (StreamHandle, tokio::task::JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let join = tokio::spawn(self.run(cmd_rx, frame_tx, state_tx, shutdown));
        (StreamHandle { commands: cmd_tx, state: state_rx }, join)
    }

    async fn run(
        self,
        mut cmd_rx: mpsc::Receiver<ClientCommand>,
        frame_tx: mpsc::Sender<Value>,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut backoff = Backoff::default();

        while !*shutdown.borrow() {
            let _ = state_tx.send(ConnectionState::Connecting);
            match self.connect_and_login().await {
                Ok(mut ws) => {
                    backoff.reset();
                    let _ = state_tx.send(ConnectionState::Connected);
                    tracing::info!("stream connected and logged in");
                    self.read_loop(&mut ws, &mut cmd_rx, &frame_tx, &mut shutdown).await;
                    let _ = ws.close(None).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "stream connect/login failed");
                }
            }

            if *shutdown.borrow() {
                break;
            }
            let delay = backoff.next_delay();
            let _ = state_tx.send(ConnectionState::Reconnecting);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }

        let _ = state_tx.send(ConnectionState::Closed);
        tracing::info!("stream client closed");
    }

    async fn connect_and_login(&self) -> anyhow::Result<WsStream> {
        let (mut ws, _) = connect_async(&self.ws_url).await?;
        let login = json!({"event": "login", "params": {"apiKey": self.api_key}});
        ws.send(Message::Text(login.to_string())).await?;

        let ack = timeout(LOGIN_DEADLINE, ws.next())
            .await
            .map_err(|_| anyhow::anyhow!("login acknowledgement timed out"))?
            .ok_or_else(|| anyhow::anyhow!("stream closed before login ack"))??;

        let Message::Text(text) = ack else {
            anyhow::bail!("unexpected login response frame type");
        };
        let value: Value = serde_json::from_str(&text)?;
        let ok = value.get("event").and_then(Value::as_str) == Some("login")
            && value.get("code").and_then(Value::as_i64) == Some(0);
        if !ok {
            anyhow::bail!("login rejected: {text}");
        }
        Ok(ws)
    }

    async fn read_loop(
        &self,
        ws: &mut WsStream,
        cmd_rx: &mut mpsc::Receiver<ClientCommand>,
        frame_tx: &mpsc::Sender<Value>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let mut heartbeat = HeartbeatTimer::new(self.heartbeat_interval);
        let mut ping_tick = tokio::time::interval(self.heartbeat_interval);

        loop {
            tokio::select! {
                frame = timeout(HeartbeatTimer::read_deadline(), ws.next()) => {
                    match frame {
                        Ok(Some(Ok(Message::Text(text)))) => {
                            heartbeat.record_frame_received();
                            match serde_json::from_str::<Value>(&text) {
                                Ok(value) => {
                                    if frame_tx.send(value).await.is_err() {
                                        tracing::warn!("frame receiver dropped, stopping read loop");
                                        return;
                                    }
                                }
                                Err(err) => tracing::warn!(error = %err, "malformed frame, dropping"),
                            }
                        }
                        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                            tracing::warn!("stream closed by peer");
                            return;
                        }
                        Ok(Some(Ok(_))) => {}
                        Ok(Some(Err(err))) => {
                            tracing::warn!(error = %err, "stream read error");
                            return;
                        }
                        Err(_) => {
                            if heartbeat.record_timeout() {
                                tracing::warn!("three consecutive read timeouts, reconnecting");
                                return;
                            }
                        }
                    }
                }
                _ = ping_tick.tick() => {
                    if heartbeat.due() {
                        let ping = json!({"event": "ping"});
                        if ws.send(Message::Text(ping.to_string())).await.is_err() {
                            return;
                        }
                        heartbeat.mark_sent();
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Subscribe(channels)) => {
                            let frame = json!({"method": "subscribe", "channels": channels});
                            if ws.send(Message::Text(frame.to_string())).await.is_err() {
                                return;
                            }
                        }
                        Some(ClientCommand::Unsubscribe(channels)) => {
                            let frame = json!({"method": "unsubscribe", "channels": channels});
                            if ws.send(Message::Text(frame.to_string())).await.is_err() {
                                return;
                            }
                        }
                        None => {}
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_shape() {
        let frame = json!({"method": "subscribe", "channels": ["liquidationOrders"]});
        assert_eq!(frame["method"], "subscribe");
    }
}
