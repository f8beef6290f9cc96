//! Voice relay WebSocket handler

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{Extensions, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt, future};
use tracing::{debug, error, info, warn};

use crate::core::relay::{ClientConnection, ClientSignal, SessionRelay};
use crate::registry::{ConnectionGuard, RegistryError};
use crate::state::AppState;

/// Outbound queue depth per client
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Voice relay WebSocket handler
///
/// Reserves a connection slot, then upgrades the request and hands the socket
/// to a fresh [`SessionRelay`]. Responds 503 when the connection limit is
/// reached.
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    extensions: Extensions,
) -> Response {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let guard = match state.registry.try_register(peer) {
        Ok(guard) => guard,
        Err(RegistryError::LimitReached(active)) => {
            warn!(peer = ?peer, active, "Rejecting connection: global limit reached");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response();
        }
    };

    debug!(connection_id = %guard.id(), peer = ?peer, "Relay WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state, guard))
}

/// Drive one client socket until it closes.
async fn handle_relay_socket(socket: WebSocket, state: Arc<AppState>, guard: ConnectionGuard) {
    let connection_id = guard.id();
    info!(
        connection_id = %connection_id,
        active = state.registry.active_count(),
        "Client connected"
    );

    let (mut sender, receiver) = socket.split();
    let (connection, mut outbound_rx) = ClientConnection::channel(connection_id, CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages; ends once the relay drops its
    // connection handle or the socket fails
    let sender_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            };

            if let Err(e) = sender.send(Message::Text(json.into())).await {
                warn!(connection_id = %connection_id, "Failed to send WebSocket message: {}", e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    let inbound = receiver.filter_map(move |frame| {
        future::ready(ClientSignal::from_frame(connection_id, frame))
    });

    SessionRelay::new(
        connection,
        state.connector.clone(),
        state.live_config.clone(),
    )
    .run(inbound)
    .await;

    if let Err(e) = sender_task.await {
        error!(connection_id = %connection_id, "Sender task failed: {}", e);
    }

    drop(guard);
    info!(
        connection_id = %connection_id,
        active = state.registry.active_count(),
        "Client connection closed"
    );
}
