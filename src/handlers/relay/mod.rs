//! Voice relay WebSocket handler
//!
//! One WebSocket per browser client. Each connection gets its own live
//! session with the remote voice model; audio flows both ways as base64 inside
//! JSON text frames.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - `{"audio": "<base64>", "mimeType": "audio/pcm;rate=16000"}`: microphone audio
//! - `{"reset": true}`: discard the conversation and start a new session
//!
//! ## Server → Client
//!
//! - `{"audio": "<base64>"}`: model audio (PCM 16-bit, 24kHz, mono)
//! - `{"interrupted": true}`: barge-in, flush queued playback
//! - `{"error": "<message>"}`: session failure
//!
//! Malformed client frames are dropped without a reply.

mod handler;

pub use handler::relay_handler;
