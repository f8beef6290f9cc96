//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `relay` - Voice relay WebSocket

pub mod api;
pub mod relay;

// Re-export commonly used handlers for convenient access
pub use api::health_check;
pub use relay::relay_handler;
