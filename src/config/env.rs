//! Environment variable loading.
//!
//! Blank variables count as unset so an empty line in `.env` never replaces a
//! default.

use std::env;
use std::str::FromStr;

use super::{ConfigError, ServerConfig};

pub(super) const HOST: &str = "HOST";
pub(super) const PORT: &str = "PORT";
pub(super) const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub(super) const GEMINI_MODEL: &str = "GEMINI_MODEL";
pub(super) const GEMINI_VOICE: &str = "GEMINI_VOICE";
pub(super) const GEMINI_SYSTEM_INSTRUCTION: &str = "GEMINI_SYSTEM_INSTRUCTION";
pub(super) const GEMINI_LIVE_URL: &str = "GEMINI_LIVE_URL";
pub(super) const CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";
pub(super) const MAX_WEBSOCKET_CONNECTIONS: &str = "MAX_WEBSOCKET_CONNECTIONS";

/// Read a variable, treating blank values as unset.
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key,
                value: value.clone(),
            })
        })
        .transpose()
}

/// Build a configuration from defaults overridden by environment variables.
pub(super) fn load() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = var(HOST) {
        config.host = host;
    }
    if let Some(port) = parse_var::<u16>(PORT)? {
        config.port = port;
    }

    config.gemini_api_key = var(GEMINI_API_KEY);
    if let Some(model) = var(GEMINI_MODEL) {
        config.gemini_model = model;
    }
    if let Some(voice) = var(GEMINI_VOICE) {
        config.gemini_voice = voice;
    }
    if let Some(instruction) = var(GEMINI_SYSTEM_INSTRUCTION) {
        config.system_instruction = instruction;
    }
    if let Some(endpoint) = var(GEMINI_LIVE_URL) {
        config.gemini_endpoint = endpoint;
    }

    if let Some(origins) = var(CORS_ALLOWED_ORIGINS) {
        config.cors_allowed_origins = origins;
    }
    config.max_websocket_connections = parse_var::<usize>(MAX_WEBSOCKET_CONNECTIONS)?;

    Ok(config)
}
