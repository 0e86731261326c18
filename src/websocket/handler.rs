use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::connection_manager::ConnectionHandle;
use crate::metrics::{ConnectionMetrics, EnvelopeMetrics};
use crate::server::AppState;

use super::message::OutboundMessage;

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_start = std::time::Instant::now();

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(state.settings.websocket.channel_buffer);
    let handle = state.connection_manager.register(tx);
    let connection_id = handle.id;

    ConnectionMetrics::record_opened();
    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending messages from channel to WebSocket
    let writer_handle = handle.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = writer_handle.closed() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
                next = rx.recv() => {
                    let Some(msg) = next else { break };
                    let frame = match msg {
                        OutboundMessage::Ping => Message::Ping(Bytes::new()),
                        // Pre-serialized messages avoid the serialization cost here
                        other => match other.to_json() {
                            Ok(Some(text)) => Message::Text(text.into()),
                            Ok(None) => continue,
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to serialize message");
                                continue;
                            }
                        },
                    };

                    if ws_sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Task for receiving messages from WebSocket, strictly in arrival order
    let state_clone = state.clone();
    let handle_clone = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &state_clone, &handle_clone).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, then stop the other
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }

    // Transport first, so the presence broadcast below skips this connection
    state.connection_manager.unregister(connection_id);
    state.router.disconnect(connection_id).await;

    let duration = connection_start.elapsed().as_secs_f64();
    ConnectionMetrics::record_closed(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

/// Process a received WebSocket message
/// Returns false if the connection should be closed
async fn process_message(msg: Message, state: &AppState, handle: &Arc<ConnectionHandle>) -> bool {
    // Evicted or timed out; whatever is still in flight is not routed
    if !handle.is_open() {
        return false;
    }

    match msg {
        Message::Text(text) => {
            handle.update_activity();
            state.router.handle_text(handle, text.as_str()).await;
            true
        }
        Message::Binary(_) => {
            handle.update_activity();
            EnvelopeMetrics::record_malformed();
            tracing::debug!(connection_id = %handle.id, "Dropping binary frame");
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings itself; only activity matters here
            handle.update_activity();
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            false
        }
    }
}
