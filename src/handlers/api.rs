use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: &'static str,
    pub active_connections: usize,
    pub total_connections: u64,
}

/// Health check handler
///
/// `GET /health`
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        provider: state.connector.provider_name(),
        active_connections: state.registry.active_count(),
        total_connections: state.registry.total_accepted(),
    })
}
