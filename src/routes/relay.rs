//! Relay route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{health_check, relay_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay router
///
/// # Endpoints
///
/// - `GET /` - WebSocket upgrade for the voice relay
/// - `GET /health` - JSON status with connection counts
///
/// # Example
///
/// ```json
/// // Client streams microphone audio
/// {"audio": "UklGRi...", "mimeType": "audio/pcm;rate=16000"}
///
/// // Server streams model audio back
/// {"audio": "AAEC..."}
/// ```
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(relay_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
}
