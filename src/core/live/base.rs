//! Base traits and types for live voice sessions.
//!
//! A live session is one bidirectional audio conversation with a hosted voice
//! model. The relay never talks to a provider directly: it asks a
//! [`LiveConnector`] to open a session and receives a boxed [`LiveSession`]
//! handle back. Remote events are delivered through the callback passed to
//! [`LiveConnector::open`], so the caller decides which task they land on.
//!
//! # Audio Format
//!
//! Payloads are carried base64-encoded exactly as they appear on the wire.
//! The relay does not decode or validate audio.

use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while opening or driving a live session.
#[derive(Debug, Error)]
pub enum LiveError {
    /// No API key was configured for the provider
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The provider closed the session before it finished initializing
    #[error("Session setup failed: {0}")]
    SetupFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The session is not open (still initializing, or already closed)
    #[error("Session not open (state: {0})")]
    NotOpen(SessionState),
}

/// Result type for live session operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Fixed configuration used for every session a relay opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSessionConfig {
    /// Model identifier (e.g., "gemini-2.5-flash-preview-native-audio-dialog")
    pub model: String,

    /// Prebuilt voice name (e.g., "Orus")
    #[serde(default)]
    pub voice: Option<String>,

    /// System instruction text
    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_GEMINI_MODEL.to_string(),
            voice: Some(crate::config::DEFAULT_GEMINI_VOICE.to_string()),
            system_instruction: None,
        }
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of a live session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    /// Connecting and waiting for the provider to accept the setup
    #[default]
    Initializing = 0,
    /// Ready to accept media
    Open = 1,
    /// Close requested, teardown in progress
    Closing = 2,
    /// Fully closed
    Closed = 3,
    /// Setup or transport failed
    Failed = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initializing,
            1 => Self::Open,
            2 => Self::Closing,
            3 => Self::Closed,
            _ => Self::Failed,
        }
    }

    /// Whether the session has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "Initializing"),
            SessionState::Open => write!(f, "Open"),
            SessionState::Closing => write!(f, "Closing"),
            SessionState::Closed => write!(f, "Closed"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

/// Lock-free session state shared between a handle and its I/O tasks.
#[derive(Debug, Clone, Default)]
pub struct SharedSessionState(Arc<AtomicU8>);

impl SharedSessionState {
    pub fn new(state: SessionState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move to `next` unless the session already reached a terminal state
    /// or is closing. Returns the state that was replaced.
    pub fn advance(&self, next: SessionState) -> SessionState {
        let previous = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                let current_state = SessionState::from_u8(current);
                if current_state.is_terminal() || current_state == SessionState::Closing {
                    // Only Closing -> Closed is allowed once teardown started
                    if current_state == SessionState::Closing && next == SessionState::Closed {
                        Some(next as u8)
                    } else {
                        None
                    }
                } else {
                    Some(next as u8)
                }
            })
            .unwrap_or_else(|current| current);
        SessionState::from_u8(previous)
    }

    /// True once a close was requested or the session ended.
    pub fn is_closing_or_closed(&self) -> bool {
        matches!(
            self.get(),
            SessionState::Closing | SessionState::Closed | SessionState::Failed
        )
    }
}

// =============================================================================
// Media and Events
// =============================================================================

/// One chunk of client audio destined for the remote session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaChunk {
    /// Base64-encoded audio payload
    pub data: String,
    /// MIME type reported by the client (e.g., "audio/pcm;rate=16000")
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl MediaChunk {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build a chunk from raw audio bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(BASE64_STANDARD.encode(bytes), mime_type)
    }
}

/// Events emitted by a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Generated audio, base64-encoded
    Audio(String),
    /// The model detected barge-in; buffered playback must be discarded
    Interrupted,
    /// Error reported by the provider or the transport
    Error(String),
    /// The remote side ended the session
    Closed(Option<String>),
}

/// Callback type for live session events.
pub type LiveEventCallback =
    Arc<dyn Fn(LiveEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Base Traits
// =============================================================================

/// Handle to one open live session.
///
/// Dropping a handle must release the remote session the same way
/// [`LiveSession::close`] does.
#[async_trait]
pub trait LiveSession: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> SessionState;

    /// Check if the session accepts media.
    fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Forward one audio chunk.
    ///
    /// Returns [`LiveError::NotOpen`] when the session is not open; callers
    /// treat that as a dropped chunk, not a failure.
    async fn send_media(&self, chunk: MediaChunk) -> LiveResult<()>;

    /// Request teardown. Idempotent. No events are delivered after this call.
    async fn close(&mut self) -> LiveResult<()>;

    /// Provider-assigned or locally generated session identifier.
    fn session_id(&self) -> &str;
}

/// Boxed trait object for live sessions.
pub type BoxedLiveSession = Box<dyn LiveSession>;

/// Factory that opens live sessions against a provider.
///
/// One connector is built at startup and shared by every relay.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a session and start delivering its events to `on_event`.
    async fn open(
        &self,
        config: &LiveSessionConfig,
        on_event: LiveEventCallback,
    ) -> LiveResult<BoxedLiveSession>;

    /// Provider name used in logs.
    fn provider_name(&self) -> &'static str;
}
