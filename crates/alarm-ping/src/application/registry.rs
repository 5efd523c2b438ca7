//! Identity Registry
//!
//! Maps a client id to non-owning handles on its connection and host. The
//! registry never extends either lifetime: once the owners drop their `Arc`s
//! the entry resolves as absent.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::domain::ClientId;
use crate::ports::{Connection, HostContext};

struct RegistryEntry {
    connection: Weak<dyn Connection>,
    host: Weak<dyn HostContext>,
}

impl RegistryEntry {
    fn is_expired(&self) -> bool {
        self.connection.strong_count() == 0 || self.host.strong_count() == 0
    }
}

/// Both handles of a live registry entry.
///
/// Holds strong references; drop it as soon as the dispatch no longer needs
/// them.
pub struct ResolvedClient {
    /// The connection to ping.
    pub connection: Arc<dyn Connection>,
    /// The host providing suspend-prevention.
    pub host: Arc<dyn HostContext>,
}

/// Client id → weak (connection, host) mapping, safe for concurrent use.
#[derive(Default)]
pub struct IdentityRegistry {
    entries: RwLock<HashMap<ClientId, RegistryEntry>>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store weak handles for `client_id`, replacing any prior entry.
    pub fn register(
        &self,
        client_id: ClientId,
        connection: &Arc<dyn Connection>,
        host: &Arc<dyn HostContext>,
    ) {
        let entry = RegistryEntry {
            connection: Arc::downgrade(connection),
            host: Arc::downgrade(host),
        };
        if self.entries.write().insert(client_id.clone(), entry).is_some() {
            debug!("[alarm-ping] Replaced registry entry for {}", client_id);
        }
    }

    /// Resolve both handles.
    ///
    /// Returns `None` for an unknown id or if either handle has expired.
    pub fn resolve(&self, client_id: &ClientId) -> Option<ResolvedClient> {
        let entries = self.entries.read();
        let entry = entries.get(client_id)?;
        let connection = entry.connection.upgrade()?;
        let host = entry.host.upgrade()?;
        Some(ResolvedClient { connection, host })
    }

    /// Remove the entry for `client_id`. Returns whether one existed.
    pub fn unregister(&self, client_id: &ClientId) -> bool {
        self.entries.write().remove(client_id).is_some()
    }

    /// Remove the entry for `client_id` only if its connection or host is
    /// gone. Returns whether it was removed.
    pub fn unregister_expired(&self, client_id: &ClientId) -> bool {
        let mut entries = self.entries.write();
        match entries.get(client_id) {
            Some(entry) if entry.is_expired() => {
                entries.remove(client_id);
                true
            }
            _ => false,
        }
    }

    /// Drop every entry whose connection or host is gone.
    pub fn prune_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Number of entries, live or expired.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
