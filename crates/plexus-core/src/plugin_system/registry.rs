use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::futures::Notified;
use tokio::sync::{Notify, RwLock};

use crate::plugin_system::dependency::DependencyRequest;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::record::PluginRecord;

pub(crate) struct RegistryInner {
    /// Arena of records; a record's slot is its index here. Insertion order
    /// is the canonical ordering for sweeps and topological emission.
    pub(crate) records: Vec<Arc<PluginRecord>>,
    pub(crate) index: HashMap<String, usize>,
}

/// Registry of plugin records, keyed by identity.
///
/// The record arena and the pending-request list sit behind separate
/// reader/writer locks; the registry lock is always acquired before the
/// pending lock. Dependency edges between records are arena slots, so
/// cyclic graphs are expressible without ownership cycles.
pub struct PluginRegistry {
    pub(crate) inner: RwLock<RegistryInner>,
    pub(crate) pending: RwLock<Vec<DependencyRequest>>,
    inserted: Notify,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                records: Vec::new(),
                index: HashMap::new(),
            }),
            pending: RwLock::new(Vec::new()),
            inserted: Notify::new(),
        }
    }

    /// Registers a descriptor and emits its dependency requests.
    ///
    /// The uniqueness check, record creation and request emission happen in
    /// one critical section under the registry write lock. A duplicate id
    /// leaves the registry untouched and returns `DuplicateId`.
    pub async fn insert(
        &self,
        descriptor: PluginDescriptor,
    ) -> Result<Arc<PluginRecord>, PluginSystemError> {
        let mut inner = self.inner.write().await;
        if inner.index.contains_key(descriptor.id()) {
            return Err(PluginSystemError::DuplicateId {
                plugin_id: descriptor.id().to_string(),
            });
        }
        let slot = inner.records.len();
        let record = Arc::new(PluginRecord::new(Arc::new(descriptor), slot));
        let requests = record.emit_requests();
        inner.index.insert(record.id().to_string(), slot);
        inner.records.push(record.clone());

        if !requests.is_empty() {
            let mut pending = self.pending.write().await;
            pending.extend(requests);
        }
        drop(inner);

        log::debug!("Registered plugin '{}' v{} (slot {})", record.id(), record.version(), slot);
        self.inserted.notify_waiters();
        Ok(record)
    }

    /// Looks up a record by id.
    pub async fn lookup(&self, id: &str) -> Option<Arc<PluginRecord>> {
        let inner = self.inner.read().await;
        inner.index.get(id).map(|slot| inner.records[*slot].clone())
    }

    /// All records in insertion order.
    pub async fn records(&self) -> Vec<Arc<PluginRecord>> {
        self.inner.read().await.records.clone()
    }

    /// Resolves an arena slot to its record.
    pub(crate) async fn record_at(&self, slot: usize) -> Option<Arc<PluginRecord>> {
        self.inner.read().await.records.get(slot).cloned()
    }

    /// All registered plugin ids in insertion order.
    pub async fn plugin_ids(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .records
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.index.contains_key(id)
    }

    /// Number of registered plugins.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    /// Removes a plugin from the registry.
    ///
    /// Removal requires de-satisfying every request the record answered and
    /// cascading the linkability revocation; neither is wired up yet, so
    /// this surfaces `Unsupported`.
    pub async fn remove(&self, id: &str) -> Result<(), PluginSystemError> {
        let _ = id;
        Err(PluginSystemError::Unsupported {
            operation: "remove".to_string(),
        })
    }

    /// Snapshot of the pending request list.
    pub async fn pending_requests(&self) -> Vec<DependencyRequest> {
        self.pending.read().await.clone()
    }

    /// Number of unsatisfied dependency requests.
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// A future that resolves after the next successful insert.
    ///
    /// Obtain the future *before* inspecting registry state, then await it,
    /// so an insert between the check and the await is not missed.
    pub fn changed(&self) -> Notified<'_> {
        self.inserted.notified()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").finish_non_exhaustive()
    }
}
