use std::collections::HashMap;
use std::sync::Arc;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::record::PluginRecord;
use crate::plugin_system::registry::PluginRegistry;

/// Matches pending dependency requests against the registry and computes
/// per-record linkability.
///
/// The resolver holds no state of its own; sweeps run on the caller's task
/// under the registry read lock and the pending-request write lock.
#[derive(Clone)]
pub struct DependencyResolver {
    registry: Arc<PluginRegistry>,
}

impl DependencyResolver {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Bulk sweep: offers every record, in insertion order, to every pending
    /// request. Satisfied requests leave the pending list and never return
    /// to it within a pass, so the sweep terminates; when several records
    /// could satisfy a request, the first in insertion order wins.
    ///
    /// Returns `true` iff the pending list is empty afterwards. Running the
    /// pass twice without an intervening insert changes nothing.
    pub async fn satisfy_pass(&self) -> bool {
        let inner = self.registry.inner.read().await;
        let mut pending = self.registry.pending.write().await;
        for candidate in inner.records.iter() {
            pending.retain_mut(|request| {
                let requestor = &inner.records[request.requestor_slot()];
                !request.try_satisfy(requestor, candidate)
            });
        }
        pending.is_empty()
    }

    /// Incremental sweep run when `candidate` has just been registered: the
    /// new record is offered to every waiting request, and the new record's
    /// own requests are tried against the whole registry in insertion order.
    ///
    /// Returns the number of requests satisfied.
    pub async fn satisfy_with(&self, candidate: &Arc<PluginRecord>) -> usize {
        let inner = self.registry.inner.read().await;
        let mut pending = self.registry.pending.write().await;
        let before = pending.len();
        pending.retain_mut(|request| {
            let requestor = &inner.records[request.requestor_slot()];
            if request.requestor_slot() == candidate.slot() {
                inner
                    .records
                    .iter()
                    .all(|other| !request.try_satisfy(requestor, other))
            } else {
                !request.try_satisfy(requestor, candidate)
            }
        });
        before - pending.len()
    }

    /// Computes linkability for `record`, marking every record proven
    /// linkable along the way.
    ///
    /// Depth-first over resolved dependency edges (the parent edge is
    /// mirrored into the dependency map when bound): an already-linkable
    /// node is a leaf success, an unresolved node aborts the walk, a node
    /// already visited closes a cycle. When the walk completes, every
    /// visited record is resolved, every cycle is internal and every
    /// outward edge lands on a linkable record, so the whole visited set is
    /// linkable together.
    ///
    /// The flag is sticky: repeated calls as more records resolve drive the
    /// registry toward the linkability fixed point.
    pub async fn link(&self, record: &Arc<PluginRecord>) -> bool {
        if record.is_linkable() {
            return true;
        }
        let inner = self.registry.inner.read().await;
        if !record.is_resolved() {
            return false;
        }

        let mut visited: HashMap<usize, Arc<PluginRecord>> = HashMap::new();
        visited.insert(record.slot(), record.clone());
        let mut stack = vec![record.slot()];

        while let Some(slot) = stack.pop() {
            let node = inner.records[slot].clone();
            for dep_slot in node.resolved_dependency_slots() {
                if visited.contains_key(&dep_slot) {
                    continue;
                }
                let dep = inner.records[dep_slot].clone();
                if dep.is_linkable() {
                    continue;
                }
                if !dep.is_resolved() {
                    log::debug!(
                        "Plugin '{}' is not linkable: '{}' is unresolved",
                        record.id(),
                        dep.id()
                    );
                    return false;
                }
                visited.insert(dep_slot, dep);
                stack.push(dep_slot);
            }
        }

        // Promote the visited component. Slot order keeps the write-lock
        // acquisition sequence consistent across concurrent traversals.
        let mut slots: Vec<usize> = visited.keys().copied().collect();
        slots.sort_unstable();
        for slot in slots {
            inner.records[slot].mark_linkable();
        }
        log::debug!(
            "Plugin '{}' linkable (component of {})",
            record.id(),
            visited.len()
        );
        true
    }

    /// Sweeps every record through [`Self::link`]; returns how many records
    /// are linkable afterwards.
    pub async fn link_all(&self) -> usize {
        let records = self.registry.records().await;
        let mut linkable = 0;
        for record in &records {
            if self.link(record).await {
                linkable += 1;
            }
        }
        linkable
    }

    /// Whether the plugin with `id` is (or can now be proven) linkable.
    pub async fn is_linkable(&self, id: &str) -> bool {
        match self.registry.lookup(id).await {
            Some(record) => self.link(&record).await,
            None => false,
        }
    }

    /// Looks up `id` and insists on linkability, reporting the first
    /// unresolved requirement when there is one.
    pub async fn require_linkable(
        &self,
        id: &str,
    ) -> Result<Arc<PluginRecord>, PluginSystemError> {
        let record = self.registry.lookup(id).await.ok_or_else(|| {
            PluginSystemError::DependencyResolution(DependencyError::MissingPlugin(id.to_string()))
        })?;
        if self.link(&record).await {
            return Ok(record);
        }
        if let Some(missing) = record.missing_requirements().into_iter().next() {
            return Err(PluginSystemError::UnresolvedDependency {
                plugin_id: record.id().to_string(),
                dependency_id: missing,
            });
        }
        Err(PluginSystemError::Unlinkable {
            plugin_id: record.id().to_string(),
        })
    }
}

impl std::fmt::Debug for DependencyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyResolver").finish_non_exhaustive()
    }
}
