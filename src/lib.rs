pub mod config;
pub mod core;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use crate::core::*;
pub use registry::{ConnectionGuard, ConnectionRegistry, RegistryError};
pub use state::AppState;
