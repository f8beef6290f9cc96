//! Gemini Live API WebSocket message types.
//!
//! All messages are JSON objects with a single top-level key naming the
//! message kind.
//!
//! # Protocol Overview
//!
//! Client messages (sent to server):
//! - setup - First message on a connection: model, generation config, system instruction
//! - realtimeInput - Streamed media chunks
//!
//! Server messages (received from server):
//! - setupComplete - Setup accepted, the session is live
//! - serverContent - Model turn parts (inline audio), interruption and turn flags
//! - goAway - Server will disconnect soon
//! - toolCall / usageMetadata - Not used by the relay
//!
//! The server frequently delivers its JSON in binary frames, so decoding
//! accepts raw bytes.

use serde::{Deserialize, Serialize};

use super::config::model_resource_name;
use crate::core::live::base::{LiveEvent, LiveSessionConfig, MediaChunk};

/// The relay only ever asks for spoken responses.
const AUDIO_MODALITY: &str = "AUDIO";

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// Messages sent to the Gemini Live API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Session setup, must be the first message
    Setup(Setup),
    /// Realtime media input
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    /// Build the setup message for a session configuration.
    pub fn setup(config: &LiveSessionConfig) -> Self {
        ClientMessage::Setup(Setup::from_config(config))
    }

    /// Wrap one media chunk as realtime input.
    pub fn media(chunk: MediaChunk) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![chunk],
        })
    }
}

/// Setup payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Model resource name (`models/<id>`)
    pub model: String,
    /// Generation configuration
    pub generation_config: GenerationConfig,
    /// System instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

impl Setup {
    pub fn from_config(config: &LiveSessionConfig) -> Self {
        let speech_config = config.voice.as_ref().map(|voice| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice.clone(),
                },
            },
        });

        let system_instruction = config
            .system_instruction
            .as_ref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| Content {
                role: None,
                parts: vec![Part::text(text.clone())],
            });

        Self {
            model: model_resource_name(&config.model),
            generation_config: GenerationConfig {
                response_modalities: vec![AUDIO_MODALITY.to_string()],
                speech_config,
            },
            system_instruction,
        }
    }
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Response modalities ("AUDIO" or "TEXT")
    pub response_modalities: Vec<String>,
    /// Voice selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Realtime input payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

// =============================================================================
// Shared content types
// =============================================================================

/// Conversation content made of parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One content part; either text or inline binary data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Inline binary data, base64-encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// Message received from the Gemini Live API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    /// Present (usually `{}`) once setup was accepted
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    /// Model output and turn signals
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    /// Disconnect warning
    #[serde(default)]
    pub go_away: Option<GoAway>,
    /// Tool call request (unused)
    #[serde(default)]
    pub tool_call: Option<serde_json::Value>,
    /// Token accounting (unused)
    #[serde(default)]
    pub usage_metadata: Option<serde_json::Value>,
}

/// Server content payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub generation_complete: bool,
}

/// Disconnect warning payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

impl ServerMessage {
    /// Decode a server message from a text or binary frame payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Relay-facing events carried by this message, in emission order:
    /// audio parts first, then the interruption flag.
    pub fn into_events(self) -> Vec<LiveEvent> {
        let Some(content) = self.server_content else {
            return Vec::new();
        };

        let mut events: Vec<LiveEvent> = content
            .model_turn
            .map(|turn| {
                turn.parts
                    .into_iter()
                    .filter_map(|part| part.inline_data)
                    .filter(|blob| !blob.data.is_empty())
                    .map(|blob| LiveEvent::Audio(blob.data))
                    .collect()
            })
            .unwrap_or_default();

        if content.interrupted {
            events.push(LiveEvent::Interrupted);
        }

        events
    }
}
