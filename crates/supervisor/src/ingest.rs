//! Decodes inbound exchange frames into buffered events and schedules
//! per-symbol analysis (spec §4.12). Grounded on the `tokio::select!`
//! read-loop idiom in `cascadeguard_ingest::stream`.

use std::sync::Arc;

use cascadeguard_core::Symbol;
use cascadeguard_ingest::{classify, FrameKind};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::analysis::run_analysis;
use crate::state::Shared;

/// Drains decoded frames from the stream client until the channel closes
/// (which happens once the stream task observes shutdown).
pub async fn ingest_loop(shared: Arc<Shared>, mut frame_rx: mpsc::Receiver<Value>) {
    while let Some(frame) = frame_rx.recv().await {
        shared.dashboard.bump(|s| s.messages_received += 1);
        route_frame(&shared, &frame);
        shared.dashboard.bump(|s| s.messages_processed += 1);
    }
    tracing::info!("ingest loop exiting: frame channel closed");
}

fn route_frame(shared: &Arc<Shared>, frame: &Value) {
    match classify(frame) {
        FrameKind::Liquidations(data) => {
            for item in cascadeguard_ingest::frame::as_items(data) {
                match cascadeguard_ingest::parse_liquidation(item) {
                    Ok(event) => {
                        let symbol = event.symbol.clone();
                        shared.buffers.add_liquidation(event);
                        shared.dashboard.bump(|s| s.liquidations_processed += 1);
                        schedule_analysis(shared.clone(), symbol);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping malformed liquidation frame");
                        shared.dashboard.bump(|s| s.errors += 1);
                    }
                }
            }
        }
        FrameKind::Trades(data) => {
            for item in cascadeguard_ingest::frame::as_items(data) {
                match cascadeguard_ingest::parse_trade(item) {
                    Ok(event) => {
                        let symbol = event.symbol.clone();
                        shared.buffers.add_trade(event);
                        shared.dashboard.bump(|s| s.trades_processed += 1);
                        schedule_analysis(shared.clone(), symbol);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping malformed trade frame");
                        shared.dashboard.bump(|s| s.errors += 1);
                    }
                }
            }
        }
        FrameKind::LoginAck { success: false } => {
            tracing::warn!("exchange login rejected");
        }
        FrameKind::LoginAck { success: true } | FrameKind::Pong | FrameKind::System => {}
    }
}

/// Spawns (or folds into an in-flight) analysis pass for `symbol`, subject
/// to the configured debounce window and the global concurrency cap.
fn schedule_analysis(shared: Arc<Shared>, symbol: Symbol) {
    tokio::spawn(async move {
        let Ok(_permit) = shared.semaphore.clone().acquire_owned().await else {
            return;
        };
        let lock = shared.symbol_lock(&symbol);
        let mut last_run_ms = lock.lock().await;
        let now_ms = shared.clock.now_ms();
        let debounce_ms = shared.config.analysis.debounce_s as i64 * 1000;
        if now_ms.saturating_sub(*last_run_ms) < debounce_ms {
            return;
        }
        *last_run_ms = now_ms;
        drop(last_run_ms);
        run_analysis(&shared, &symbol, now_ms).await;
    });
}
