//! WebSocket Event Broadcasting
//!
//! Real-time event streaming for situation-room dashboards. Every connected
//! client receives every report event; there is one election, so no
//! per-client filtering is needed.
//!
//! ## Architecture
//!
//! - Uses tokio broadcast channel for event distribution
//! - Automatic reconnection support via standard WebSocket protocol
//! - JSON-serialized events using the WsEvent enum

use crate::error::ApiResult;
use crate::events::WsEvent;
use crate::middleware::CallerExtractor;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use escruta_core::ReporterId;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// WebSocket state shared across the application.
///
/// Injected into Axum route handlers; holds the broadcast channel that
/// distributes events to connected clients.
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for sending events to all connected clients.
    tx: broadcast::Sender<WsEvent>,
}

impl WsState {
    /// Create a new WebSocket state with the specified channel capacity.
    ///
    /// The capacity determines how many events can be buffered before slow
    /// consumers start dropping messages.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast an event to all connected clients.
    ///
    /// Non-blocking. With no clients connected the event is dropped; a
    /// client with a full buffer misses the event (lagged).
    pub fn broadcast(&self, event: WsEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receiver_count) => {
                debug!(
                    event_type = event_type,
                    receivers = receiver_count,
                    "Broadcast event"
                );
            }
            Err(_) => {
                // No receivers connected - this is fine
                debug!(event_type = event_type, "No receivers for event");
            }
        }
    }

    /// Subscribe to the event stream.
    ///
    /// The receiver must be polled to avoid lagging.
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.tx.subscribe()
    }
}

/// WebSocket upgrade handler.
///
/// Upgrades an HTTP connection to a WebSocket connection. The client must
/// carry a valid bearer token; the auth middleware resolves it to a caller
/// identity before the upgrade.
///
/// ## Protocol
///
/// 1. Client connects with its bearer token
/// 2. Connection upgraded to WebSocket
/// 3. Server sends Connected event with the caller's reporter id
/// 4. Server streams report events as they happen
/// 5. Client can send ping frames to keep the connection alive
/// 6. On disconnect, server sends Disconnected event
///
/// ## Example
///
/// ```text
/// GET /api/v1/ws
/// Authorization: Bearer <token>
/// Upgrade: websocket
/// ```
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
    CallerExtractor(caller): CallerExtractor,
) -> ApiResult<Response> {
    let reporter_id = caller.reporter_id;

    info!(
        reporter = %reporter_id,
        name = %caller.display_name,
        "WebSocket connection request"
    );

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, reporter_id)))
}

/// Handle an individual WebSocket connection.
///
/// Runs for the lifetime of the connection, forwarding broadcast events to
/// the client.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>, reporter_id: ReporterId) {
    info!(reporter = %reporter_id, "WebSocket connected");

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Subscribe to the broadcast channel
    let mut rx = state.subscribe();

    // Send initial Connected event
    let connected_event = WsEvent::Connected { reporter_id };
    if let Err(e) = send_event(&mut sender, connected_event).await {
        error!(reporter = %reporter_id, error = %e, "Failed to send Connected event");
        return;
    }

    // Spawn a task to handle incoming messages from the client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!(reporter = %reporter_id, "Client sent close frame");
                    break;
                }
                Ok(Message::Ping(data)) => {
                    debug!(reporter = %reporter_id, "Received ping");
                    // Pong is automatically sent by axum
                    let _ = data;
                }
                Ok(Message::Pong(_)) => {
                    debug!(reporter = %reporter_id, "Received pong");
                }
                Ok(Message::Text(text)) => {
                    debug!(
                        reporter = %reporter_id,
                        text = %text,
                        "Received text message (ignored)"
                    );
                }
                Ok(Message::Binary(data)) => {
                    debug!(
                        reporter = %reporter_id,
                        len = data.len(),
                        "Received binary message (ignored)"
                    );
                }
                Err(e) => {
                    warn!(reporter = %reporter_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Main loop: forward events to the client
    loop {
        tokio::select! {
            // Receive event from broadcast channel
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Err(e) = send_event(&mut sender, event).await {
                            error!(
                                reporter = %reporter_id,
                                error = %e,
                                "Failed to send event, closing connection"
                            );
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            reporter = %reporter_id,
                            skipped = skipped,
                            "Client lagged, some events were dropped"
                        );
                        // Send error event to notify client
                        let error_event = WsEvent::Error {
                            message: format!("Lagged: {} events dropped", skipped),
                        };
                        if let Err(e) = send_event(&mut sender, error_event).await {
                            error!(reporter = %reporter_id, error = %e, "Failed to send error event");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(reporter = %reporter_id, "Broadcast channel closed");
                        break;
                    }
                }
            }

            // Check if receiver task finished (client disconnected)
            _ = &mut recv_task => {
                debug!(reporter = %reporter_id, "Receiver task finished");
                break;
            }
        }
    }

    // Send Disconnected event before closing
    let disconnected_event = WsEvent::Disconnected {
        reason: "Connection closed".to_string(),
    };
    let _ = send_event(&mut sender, disconnected_event).await;

    info!(reporter = %reporter_id, "WebSocket disconnected");
}

/// Send an event to the WebSocket client.
///
/// Serializes the event to JSON and sends it as a text message.
async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: WsEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(&event).map_err(|e| {
        error!(error = %e, "Failed to serialize event");
        axum::Error::new(e)
    })?;

    sender.send(Message::Text(json.into())).await
}
