//! Gemini Live API module.
//!
//! This module provides real-time audio-to-audio sessions using Google's
//! Gemini Live API (`BidiGenerateContent` over WebSocket).
//!
//! # Features
//!
//! - Bidirectional audio streaming
//! - Prebuilt voice selection
//! - System instructions
//! - Barge-in (interruption) signalling
//!
//! # Audio Format
//!
//! Input audio is forwarded with the MIME type reported by the browser
//! (typically `audio/pcm;rate=16000`). Output audio is PCM 16-bit at 24kHz,
//! base64-encoded.

mod client;
mod config;
mod messages;

pub use client::{GeminiLiveConnector, GeminiLiveSession};
pub use config::{GEMINI_LIVE_URL, GeminiVoice, model_resource_name};
pub use messages::{ClientMessage, ServerContent, ServerMessage, Setup};
