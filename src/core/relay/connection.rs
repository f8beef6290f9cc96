//! Client-side connection primitives.
//!
//! A [`ClientConnection`] is the sending half of one browser WebSocket. The
//! socket itself is owned by the handler's writer task; the relay only ever
//! queues [`OutboundClientMessage`]s. Inbound frames are turned into
//! [`ClientSignal`]s before they reach the relay.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{InboundClientMessage, OutboundClientMessage};

/// Opaque identifier of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport state of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Sending half of a browser connection.
///
/// Cheap to clone; every clone shares the transport state.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    id: ConnectionId,
    state: Arc<AtomicU8>,
    sender: mpsc::Sender<OutboundClientMessage>,
}

impl ClientConnection {
    /// Create a connection and the receiver its writer task drains.
    pub fn channel(
        id: ConnectionId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundClientMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let connection = Self {
            id,
            state: Arc::new(AtomicU8::new(ConnectionState::Open as u8)),
            sender,
        };
        (connection, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a message for the client.
    ///
    /// Returns `false` when the message was dropped because the transport is
    /// no longer open.
    pub async fn send(&self, message: OutboundClientMessage) -> bool {
        if !self.is_open() {
            tracing::debug!(
                connection_id = %self.id,
                kind = message.kind(),
                "Client connection closed, dropping message"
            );
            return false;
        }

        if self.sender.send(message).await.is_err() {
            tracing::warn!(connection_id = %self.id, "Client writer gone, marking connection closed");
            self.mark_closed();
            return false;
        }
        true
    }

    pub fn mark_closing(&self) {
        let _ = self.state.compare_exchange(
            ConnectionState::Open as u8,
            ConnectionState::Closing as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn mark_closed(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::SeqCst);
    }
}

/// Signal delivered from the client transport to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientSignal {
    /// A well-formed client message
    Message(InboundClientMessage),
    /// The client closed the connection
    Closed,
    /// The transport failed
    Error(String),
}

impl ClientSignal {
    /// Interpret one raw WebSocket frame.
    ///
    /// Returns `None` for frames the relay ignores: binary and ping/pong
    /// frames, and text frames that fail to parse.
    pub fn from_frame(connection_id: ConnectionId, frame: Result<Message, axum::Error>) -> Option<Self> {
        match frame {
            Ok(Message::Text(text)) => match InboundClientMessage::parse(text.as_str()) {
                Ok(message) => Some(Self::Message(message)),
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, "Discarding client frame: {}", e);
                    None
                }
            },
            Ok(Message::Close(_)) => Some(Self::Closed),
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection_id = %connection_id, "Ignoring binary client frame");
                None
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Err(e) => Some(Self::Error(e.to_string())),
        }
    }
}
