//! Connection registry.
//!
//! # Responsibilities
//! - Own the identifier → entry map; callers only see the operations below
//! - Fetch each device's parameter description at registration
//! - Replace entries atomically on re-registration
//! - Remove an entry only on behalf of the session that created it
//!
//! # Design Decisions
//! - The map lock is held for insert/lookup/remove only, never across I/O
//! - Entries are handed out as `Arc<Entry>`; a replaced entry stays valid
//!   for whoever still holds it but is no longer reachable by identifier
//! - A failing parameter source yields an empty description, not an error

pub mod entry;
pub mod history;

pub use entry::{Entry, Transport};
pub use history::History;

use dashmap::DashMap;
use std::sync::Arc;

use crate::error::BridgeError;
use crate::net::ConnectionId;
use crate::paraminfo::{describe_blocking, AllInfo, ParameterSource};
use crate::protocol::CompositeKey;

/// Process-wide table of registered devices.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    entries: DashMap<String, Arc<Entry>>,
    source: Arc<dyn ParameterSource>,
    history_capacity: usize,
}

impl Registry {
    pub fn new(source: Arc<dyn ParameterSource>, history_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: DashMap::new(),
                source,
                history_capacity,
            }),
        }
    }

    pub fn source(&self) -> Arc<dyn ParameterSource> {
        Arc::clone(&self.inner.source)
    }

    /// Create an entry for a freshly registered connection.
    ///
    /// The description is fetched before the map is touched; the insert then
    /// swaps out any previous entry under the same identifier in one step.
    pub async fn register(
        &self,
        identifier: &str,
        connection_id: ConnectionId,
        transport: Transport,
        plugin: &str,
    ) -> Arc<Entry> {
        let description = match describe_blocking(self.source(), plugin).await {
            Ok(description) => description,
            Err(e) => {
                tracing::warn!(
                    device_id = %identifier,
                    plugin = %plugin,
                    error = %e,
                    "Parameter description unavailable, using empty description"
                );
                AllInfo::default()
            }
        };

        let entry = Arc::new(Entry::new(
            identifier.to_string(),
            connection_id,
            plugin.to_string(),
            description,
            transport,
            self.inner.history_capacity,
        ));

        let previous = self
            .inner
            .entries
            .insert(identifier.to_string(), Arc::clone(&entry));

        match previous {
            Some(old) => tracing::info!(
                device_id = %identifier,
                connection_id = %connection_id,
                replaced = %old.connection_id(),
                "Device re-registered"
            ),
            None => tracing::info!(
                device_id = %identifier,
                connection_id = %connection_id,
                plugin = %plugin,
                "Device registered"
            ),
        }
        entry
    }

    pub fn lookup(&self, identifier: &str) -> Result<Arc<Entry>, BridgeError> {
        self.inner
            .entries
            .get(identifier)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BridgeError::NotFound(identifier.to_string()))
    }

    /// Merge a reported value, if `connection_id` still owns the identifier.
    pub fn record_report(
        &self,
        identifier: &str,
        connection_id: ConnectionId,
        key: CompositeKey,
        value: String,
    ) -> bool {
        let entry = match self.inner.entries.get(identifier) {
            Some(entry) if entry.connection_id() == connection_id => Arc::clone(entry.value()),
            _ => return false,
        };
        entry.store_report(key, value);
        true
    }

    /// Remove the entry, if `connection_id` still owns the identifier.
    pub fn remove(&self, identifier: &str, connection_id: ConnectionId) -> bool {
        let removed = self
            .inner
            .entries
            .remove_if(identifier, |_, entry| entry.connection_id() == connection_id)
            .is_some();
        if removed {
            tracing::info!(device_id = %identifier, connection_id = %connection_id, "Device removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Identifiers currently registered, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}
