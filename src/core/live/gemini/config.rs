//! Gemini Live API configuration types.
//!
//! This module contains configuration types for the Gemini Live API:
//! - Endpoint selection
//! - Prebuilt voice selection
//! - Model name normalization

use serde::{Deserialize, Serialize};

/// Gemini Live API WebSocket endpoint (BidiGenerateContent).
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Prefix the setup message expects in front of model ids.
const MODEL_PREFIX: &str = "models/";

/// Normalize a model id into the `models/<id>` resource name.
pub fn model_resource_name(model: &str) -> String {
    let model = model.trim();
    if model.starts_with(MODEL_PREFIX) {
        model.to_string()
    } else {
        format!("{MODEL_PREFIX}{model}")
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Prebuilt voices available for Gemini native audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeminiVoice {
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
    Leda,
    /// Orus voice (default)
    #[default]
    Orus,
    Zephyr,
}

impl GeminiVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Kore => "Kore",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
            Self::Leda => "Leda",
            Self::Orus => "Orus",
            Self::Zephyr => "Zephyr",
        }
    }

    /// Parse a voice name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "puck" => Some(Self::Puck),
            "charon" => Some(Self::Charon),
            "kore" => Some(Self::Kore),
            "fenrir" => Some(Self::Fenrir),
            "aoede" => Some(Self::Aoede),
            "leda" => Some(Self::Leda),
            "orus" => Some(Self::Orus),
            "zephyr" => Some(Self::Zephyr),
            _ => None,
        }
    }
}

impl std::fmt::Display for GeminiVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
