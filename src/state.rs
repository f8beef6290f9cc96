use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::live::{GeminiLiveConnector, LiveConnector, LiveSessionConfig};
use crate::registry::ConnectionRegistry;

/// Shared application state.
///
/// Built once at startup. The connector is the only way relays reach the
/// remote voice service.
pub struct AppState {
    pub config: ServerConfig,
    pub connector: Arc<dyn LiveConnector>,
    pub live_config: LiveSessionConfig,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Build state with the Gemini Live connector described by `config`.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let connector = Arc::new(GeminiLiveConnector::with_endpoint(
            config.gemini_api_key.clone(),
            config.gemini_endpoint.clone(),
        ));
        Self::with_connector(config, connector)
    }

    /// Build state around an arbitrary connector.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn LiveConnector>) -> Arc<Self> {
        let live_config = config.live_session_config();
        let registry = Arc::new(ConnectionRegistry::new(config.max_websocket_connections));

        Arc::new(Self {
            config,
            connector,
            live_config,
            registry,
        })
    }
}
