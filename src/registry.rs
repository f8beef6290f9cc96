//! Bookkeeping for live client connections.
//!
//! Every accepted WebSocket registers here before its relay starts and holds
//! a [`ConnectionGuard`] for as long as the socket task runs. Dropping the
//! guard removes the entry, so a panicking or aborted task still releases
//! its slot.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;

use crate::core::relay::ConnectionId;

/// Errors returned when a connection cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Connection limit reached ({0} active)")]
    LimitReached(usize),
}

/// What the registry knows about one connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub peer: Option<SocketAddr>,
    pub accepted_at: Instant,
}

/// Registry of active client connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    max_connections: Option<usize>,
    active: AtomicUsize,
    total_accepted: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(max_connections: Option<usize>) -> Self {
        Self {
            connections: DashMap::new(),
            max_connections,
            active: AtomicUsize::new(0),
            total_accepted: AtomicU64::new(0),
        }
    }

    /// Reserve a slot and register a new connection.
    ///
    /// The slot is taken atomically so concurrent upgrades can never exceed
    /// the limit.
    pub fn try_register(
        self: &Arc<Self>,
        peer: Option<SocketAddr>,
    ) -> Result<ConnectionGuard, RegistryError> {
        let max = self.max_connections;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match max {
                Some(limit) if current >= limit => None,
                _ => Some(current + 1),
            })
            .map_err(RegistryError::LimitReached)?;

        let id = ConnectionId::new();
        self.connections.insert(
            id,
            ConnectionInfo {
                peer,
                accepted_at: Instant::now(),
            },
        );
        self.total_accepted.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(connection_id = %id, peer = ?peer, "Connection registered");

        Ok(ConnectionGuard {
            id,
            registry: Arc::clone(self),
        })
    }

    fn release(&self, id: &ConnectionId) {
        if let Some((_, info)) = self.connections.remove(id) {
            self.active.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(
                connection_id = %id,
                duration_ms = info.accepted_at.elapsed().as_millis() as u64,
                "Connection released"
            );
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total_accepted(&self) -> u64 {
        self.total_accepted.load(Ordering::Relaxed)
    }

    pub fn max_connections(&self) -> Option<usize> {
        self.max_connections
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn info(&self, id: &ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }
}

/// RAII registration of one connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}
