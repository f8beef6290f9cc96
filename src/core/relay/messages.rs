//! Client WebSocket message types
//!
//! The browser protocol is deliberately tiny: untagged JSON objects whose
//! keys identify the message.
//!
//! Client -> Server:
//! ```json
//! { "audio": "<base64 payload>", "mimeType": "audio/pcm;rate=16000" }
//! { "reset": true }
//! ```
//!
//! Server -> Client:
//! ```json
//! { "audio": "<base64 payload>" }
//! { "interrupted": true }
//! { "error": "<message>" }
//! ```

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::core::live::{LiveEvent, MediaChunk};

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Reasons a client frame is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The frame is not a JSON object
    #[error("Invalid message format: {0}")]
    InvalidJson(String),

    /// Valid JSON that is neither an audio chunk nor a reset request
    #[error("Message has neither audio+mimeType nor reset")]
    MissingFields,
}

/// Message received from the browser client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundClientMessage {
    /// One chunk of microphone audio
    AudioChunk(MediaChunk),
    /// Drop the current conversation and start a new one
    ResetRequest,
}

/// Loosely typed view of a client frame.
///
/// Fields are kept as raw JSON values so a badly typed field only disqualifies
/// the message kind it belongs to, never the whole frame.
#[derive(Debug, Deserialize)]
struct RawClientFrame {
    #[serde(default)]
    audio: Option<Value>,
    #[serde(default, rename = "mimeType")]
    mime_type: Option<Value>,
    #[serde(default)]
    reset: Option<Value>,
}

/// Non-empty string field, if present.
fn non_empty_str(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Whether a `reset` value asks for a reset.
///
/// Browsers send `true`, but `1` and `"true"` are accepted too. `false`,
/// `0`, `""` and `null` are not requests.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl InboundClientMessage {
    /// Parse one text frame.
    ///
    /// An audio chunk needs both `audio` and `mimeType` as non-empty strings;
    /// it takes precedence over `reset` when both are present.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let raw: RawClientFrame =
            serde_json::from_str(text).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        let reset = raw.reset.as_ref().is_some_and(is_truthy);
        match (non_empty_str(raw.audio), non_empty_str(raw.mime_type)) {
            (Some(audio), Some(mime_type)) => {
                Ok(Self::AudioChunk(MediaChunk::new(audio, mime_type)))
            }
            _ if reset => Ok(Self::ResetRequest),
            _ => Err(ParseError::MissingFields),
        }
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Message sent to the browser client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundClientMessage {
    /// Generated audio to play back, base64-encoded
    AudioChunk(String),
    /// Barge-in detected; the client must flush its playback queue
    Interrupted,
    /// Error reported by the relay or the remote session
    Error(String),
}

impl OutboundClientMessage {
    /// Translate a remote event into the client shape.
    ///
    /// `Closed` has no client representation.
    pub fn from_live_event(event: LiveEvent) -> Option<Self> {
        match event {
            LiveEvent::Audio(data) => Some(Self::AudioChunk(data)),
            LiveEvent::Interrupted => Some(Self::Interrupted),
            LiveEvent::Error(message) => Some(Self::Error(message)),
            LiveEvent::Closed(_) => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AudioChunk(_) => "audio",
            Self::Interrupted => "interrupted",
            Self::Error(_) => "error",
        }
    }
}

impl Serialize for OutboundClientMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::AudioChunk(data) => map.serialize_entry("audio", data)?,
            Self::Interrupted => map.serialize_entry("interrupted", &true)?,
            Self::Error(message) => map.serialize_entry("error", message)?,
        }
        map.end()
    }
}
