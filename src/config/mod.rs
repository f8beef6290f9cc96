//! Configuration module for the voice relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//!
//! # Example
//! ```rust,no_run
//! use voice_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use thiserror::Error;

use crate::core::live::gemini::{GEMINI_LIVE_URL, GeminiVoice};
use crate::core::live::LiveSessionConfig;

mod env;
mod yaml;

pub use yaml::YamlConfig;

/// Default Gemini Live model with native audio dialog.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-native-audio-dialog";

/// Default prebuilt voice.
pub const DEFAULT_GEMINI_VOICE: &str = "Orus";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default system instruction: a Revolt Motors product assistant.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant for Revolt Motors, an electric vehicle company.
You should only provide information about Revolt Motors products, services, and electric vehicles in general.

IMPORTANT: Respond in the same language as the user's question. If they ask in Hindi, respond in Hindi. If they ask in English, respond in English.

Key points about Revolt Motors:
- Revolt Motors is an Indian electric vehicle manufacturer
- They produce electric motorcycles and scooters
- Focus on sustainable transportation solutions
- Provide information about their vehicle lineup, features, pricing, and dealership locations
- If asked about other topics, politely redirect the conversation back to Revolt Motors

Keep responses conversational, helpful, and focused on electric vehicles and Revolt Motors.";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
///
/// Contains everything needed to run the relay:
/// - Server settings (host, port)
/// - Gemini Live credentials and session settings
/// - Security settings (CORS, connection limit)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Gemini Live settings
    /// API key; when absent every relay reports an initialization error
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_voice: String,
    pub system_instruction: String,
    /// Live API WebSocket endpoint, overridable for proxies and tests
    pub gemini_endpoint: String,

    // Security settings
    /// Comma-separated origins, or `*` for any origin
    pub cors_allowed_origins: String,
    /// Global cap on concurrent client connections (None = unlimited)
    pub max_websocket_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_voice: DEFAULT_GEMINI_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            gemini_endpoint: GEMINI_LIVE_URL.to_string(),
            cors_allowed_origins: "*".to_string(),
            max_websocket_connections: None,
        }
    }
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables over defaults.
    ///
    /// The `.env` file is loaded by `main` before this is called.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = env::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed,
    /// an environment variable has an invalid format, or validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = env::load()?;
        config.apply_yaml(yaml_config);
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
        }

        if let Some(gemini) = yaml.gemini {
            if let Some(api_key) = gemini.api_key.filter(|key| !key.trim().is_empty()) {
                self.gemini_api_key = Some(api_key);
            }
            if let Some(model) = gemini.model {
                self.gemini_model = model;
            }
            if let Some(voice) = gemini.voice {
                self.gemini_voice = voice;
            }
            if let Some(instruction) = gemini.system_instruction {
                self.system_instruction = instruction;
            }
            if let Some(endpoint) = gemini.endpoint {
                self.gemini_endpoint = endpoint;
            }
        }

        if let Some(security) = yaml.security {
            if let Some(origins) = security.cors_allowed_origins {
                self.cors_allowed_origins = origins;
            }
            if let Some(max) = security.max_websocket_connections {
                self.max_websocket_connections = Some(max);
            }
        }
    }

    /// Check the merged configuration.
    ///
    /// An unknown voice only warns; the provider may accept voices this build
    /// does not know about.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }

        if self.gemini_model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Gemini model must not be empty".to_string(),
            ));
        }

        let endpoint = url::Url::parse(&self.gemini_endpoint).map_err(|e| {
            ConfigError::Invalid(format!(
                "Gemini endpoint '{}' is not a valid URL: {e}",
                self.gemini_endpoint
            ))
        })?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "Gemini endpoint must use ws:// or wss://, got '{}'",
                endpoint.scheme()
            )));
        }

        if self.max_websocket_connections == Some(0) {
            return Err(ConfigError::Invalid(
                "max_websocket_connections must be greater than zero".to_string(),
            ));
        }

        // An origin the CORS layer cannot use would silently lock browsers out
        for origin in self.cors_origins().unwrap_or_default() {
            let is_origin = url::Url::parse(&origin)
                .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
            if !is_origin || http::HeaderValue::from_str(&origin).is_err() {
                return Err(ConfigError::InvalidValue {
                    key: "cors_allowed_origins",
                    value: origin,
                });
            }
        }

        if GeminiVoice::parse(&self.gemini_voice).is_none() {
            tracing::warn!(voice = %self.gemini_voice, "Unknown Gemini voice, passing it through");
        }

        Ok(())
    }

    /// Get the server address as a string in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_gemini_credential(&self) -> bool {
        self.gemini_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Allowed CORS origins, or `None` when any origin is allowed.
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            None
        } else {
            Some(origins)
        }
    }

    /// Session configuration used for every live session.
    pub fn live_session_config(&self) -> LiveSessionConfig {
        LiveSessionConfig {
            model: self.gemini_model.clone(),
            voice: Some(self.gemini_voice.clone()),
            system_instruction: Some(self.system_instruction.clone()),
        }
    }
}
