//! Live voice session module.
//!
//! This module provides the abstraction over a hosted conversational voice
//! model and its Gemini implementation.
//!
//! # Architecture
//!
//! - `LiveConnector` opens sessions; one instance is shared process-wide
//! - `LiveSession` is the handle to one open session (send media, close)
//! - Remote events (audio, interruption, error, closed) arrive through the
//!   callback handed to `LiveConnector::open`
//!
//! # Example
//!
//! ```rust,ignore
//! use voice_relay::core::live::{GeminiLiveConnector, LiveConnector, LiveSessionConfig, MediaChunk};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = GeminiLiveConnector::new(std::env::var("GEMINI_API_KEY").ok());
//!
//!     let session = connector
//!         .open(&LiveSessionConfig::default(), Arc::new(|event| Box::pin(async move {
//!             println!("{event:?}");
//!         })))
//!         .await
//!         .unwrap();
//!
//!     session.send_media(MediaChunk::new("QUJD", "audio/pcm;rate=16000")).await.unwrap();
//! }
//! ```

mod base;
pub mod gemini;

pub use base::{
    BoxedLiveSession, LiveConnector, LiveError, LiveEvent, LiveEventCallback, LiveResult,
    LiveSession, LiveSessionConfig, MediaChunk, SessionState,
    SharedSessionState,
};
pub use gemini::{GeminiLiveConnector, GeminiLiveSession, GeminiVoice};
