use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::plugin_system::dependency::{
    DependencyError, DependencyRequest, PluginDependency, SatisfiedRef,
};
use crate::plugin_system::descriptor::{Hook, HookFn, PluginDescriptor, PluginInstance};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::lifecycle::InitArgs;

/// Observable lifecycle state of a plugin, derived from the record's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Registered,
    Resolved,
    Linkable,
    Constructed,
    Active,
    Inactive,
}

/// Sorted hook list with a resume position.
///
/// Built lazily from the descriptor at first use and memoized. `next` points
/// at the hook that failed last, so a retry picks up where the previous
/// attempt stopped; a completed run resets it.
struct HookCursor {
    hooks: Vec<HookFn>,
    next: usize,
}

impl HookCursor {
    fn new(declared: &[Hook]) -> Self {
        let mut keyed: Vec<(i32, usize, HookFn)> = declared
            .iter()
            .enumerate()
            .map(|(index, hook)| (hook.priority, index, hook.callback.clone()))
            .collect();
        keyed.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        Self {
            hooks: keyed.into_iter().map(|(_, _, callback)| callback).collect(),
            next: 0,
        }
    }
}

/// Mutable per-plugin runtime state.
///
/// One record exists per registered plugin, addressed by its arena slot.
/// Dependency edges are arena slots rather than references, so cyclic graphs
/// carry no ownership cycles. Sub-state is guarded by the record's own
/// locks; callers must respect the registry-first lock order and never hold
/// these guards across an await.
pub struct PluginRecord {
    descriptor: Arc<PluginDescriptor>,
    slot: usize,
    required_dep_ids: HashSet<String>,
    parent: Mutex<Option<usize>>,
    linkable: RwLock<bool>,
    deps: Mutex<Vec<(String, usize)>>,
    instance: Mutex<Option<PluginInstance>>,
    active: AtomicBool,
    ever_activated: AtomicBool,
    activators: Mutex<Option<HookCursor>>,
    deactivators: Mutex<Option<HookCursor>>,
    satisfied: Mutex<Vec<SatisfiedRef>>,
}

impl PluginRecord {
    pub(crate) fn new(descriptor: Arc<PluginDescriptor>, slot: usize) -> Self {
        let required_dep_ids = descriptor
            .dependencies()
            .iter()
            .filter(|d| d.required)
            .map(|d| d.plugin_id.clone())
            .collect();
        Self {
            descriptor,
            slot,
            required_dep_ids,
            parent: Mutex::new(None),
            linkable: RwLock::new(false),
            deps: Mutex::new(Vec::new()),
            instance: Mutex::new(None),
            active: AtomicBool::new(false),
            ever_activated: AtomicBool::new(false),
            activators: Mutex::new(None),
            deactivators: Mutex::new(None),
            satisfied: Mutex::new(Vec::new()),
        }
    }

    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    pub fn version(&self) -> &str {
        self.descriptor.version()
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    /// Emits the dependency requests this record puts on the pending list:
    /// one per declared dependency plus, when a parent is declared, one for
    /// the parent slot.
    pub(crate) fn emit_requests(&self) -> Vec<DependencyRequest> {
        let mut requests: Vec<DependencyRequest> = self
            .descriptor
            .dependencies()
            .iter()
            .map(|dep| DependencyRequest::regular(self.id(), self.slot, dep.clone()))
            .collect();
        if let Some(parent_id) = self.descriptor.parent() {
            requests.push(DependencyRequest::parent(self.id(), self.slot, parent_id));
        }
        requests
    }

    // --- Binding -----------------------------------------------------------

    /// Binds `candidate` into the resolved-dependency map.
    ///
    /// Registry uniqueness means an existing binding under this id can only
    /// be the candidate itself; the caller has already checked the version
    /// constraint against it, so re-binding the same record is a no-op
    /// success and anything else refuses the bind.
    pub(crate) fn bind_dependency(
        &self,
        candidate: &PluginRecord,
        want: &PluginDependency,
    ) -> Result<(), DependencyError> {
        let mut deps = self.deps.lock().expect("record dependencies lock poisoned");
        if let Some((_, existing_slot)) = deps.iter().find(|(id, _)| id == &want.plugin_id) {
            if *existing_slot == candidate.slot {
                return Ok(());
            }
            return Err(DependencyError::AlreadyBound {
                plugin_id: want.plugin_id.clone(),
            });
        }
        deps.push((want.plugin_id.clone(), candidate.slot));
        Ok(())
    }

    /// Binds `candidate` into the parent slot and mirrors it into the
    /// resolved-dependency map (reusing an existing binding when present).
    pub(crate) fn bind_parent(&self, candidate: &PluginRecord) -> Result<(), DependencyError> {
        match self.descriptor.parent() {
            Some(declared) if declared == candidate.id() => {}
            _ => {
                return Err(DependencyError::Other(format!(
                    "'{}' is not the declared parent of '{}'",
                    candidate.id(),
                    self.id()
                )));
            }
        }
        let mut parent = self.parent.lock().expect("record parent lock poisoned");
        if let Some(existing) = *parent {
            if existing == candidate.slot {
                return Ok(());
            }
            return Err(DependencyError::AlreadyBound {
                plugin_id: candidate.id().to_string(),
            });
        }
        *parent = Some(candidate.slot);
        let mut deps = self.deps.lock().expect("record dependencies lock poisoned");
        if !deps.iter().any(|(id, _)| id == candidate.id()) {
            deps.push((candidate.id().to_string(), candidate.slot));
        }
        Ok(())
    }

    pub(crate) fn unbind_dependency(&self, dep_id: &str) -> bool {
        let mut deps = self.deps.lock().expect("record dependencies lock poisoned");
        let before = deps.len();
        deps.retain(|(id, _)| id != dep_id);
        deps.len() != before
    }

    pub(crate) fn unbind_parent(&self) -> Option<usize> {
        self.parent
            .lock()
            .expect("record parent lock poisoned")
            .take()
    }

    pub(crate) fn note_satisfied(&self, request: &DependencyRequest) {
        let mut satisfied = self.satisfied.lock().expect("record satisfied lock poisoned");
        satisfied.push(SatisfiedRef {
            requestor: request.requestor().to_string(),
            dependency_id: request.want().plugin_id.clone(),
            kind: request.kind(),
        });
    }

    /// Requests this record has satisfied; the future removal path walks
    /// these to de-satisfy dependents.
    pub fn satisfied_requests(&self) -> Vec<SatisfiedRef> {
        self.satisfied
            .lock()
            .expect("record satisfied lock poisoned")
            .clone()
    }

    // --- Resolution state --------------------------------------------------

    /// Resolved means: the parent (if declared) is bound and every required
    /// dependency is bound. Unbound optional dependencies do not count
    /// against resolution.
    pub fn is_resolved(&self) -> bool {
        if self.descriptor.parent().is_some()
            && self
                .parent
                .lock()
                .expect("record parent lock poisoned")
                .is_none()
        {
            return false;
        }
        let deps = self.deps.lock().expect("record dependencies lock poisoned");
        self.required_dep_ids
            .iter()
            .all(|needed| deps.iter().any(|(id, _)| id == needed))
    }

    /// Required dependency ids (and the parent id) that are not yet bound.
    pub fn missing_requirements(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if let Some(parent_id) = self.descriptor.parent() {
            if self
                .parent
                .lock()
                .expect("record parent lock poisoned")
                .is_none()
            {
                missing.push(parent_id.to_string());
            }
        }
        let deps = self.deps.lock().expect("record dependencies lock poisoned");
        for needed in self.descriptor.dependencies().iter().filter(|d| d.required) {
            if !deps.iter().any(|(id, _)| id == &needed.plugin_id)
                && !missing.contains(&needed.plugin_id)
            {
                missing.push(needed.plugin_id.clone());
            }
        }
        missing
    }

    pub fn has_dependency(&self, dep_id: &str) -> bool {
        self.deps
            .lock()
            .expect("record dependencies lock poisoned")
            .iter()
            .any(|(id, _)| id == dep_id)
    }

    /// Bound dependency arena slots in binding order.
    pub(crate) fn resolved_dependency_slots(&self) -> Vec<usize> {
        self.deps
            .lock()
            .expect("record dependencies lock poisoned")
            .iter()
            .map(|(_, slot)| *slot)
            .collect()
    }

    /// Bound dependency ids in binding order.
    pub fn resolved_dependency_ids(&self) -> Vec<String> {
        self.deps
            .lock()
            .expect("record dependencies lock poisoned")
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn parent_slot(&self) -> Option<usize> {
        *self.parent.lock().expect("record parent lock poisoned")
    }

    // --- Linkability -------------------------------------------------------

    /// Sticky linkability flag. Once set it never reverts while removal is
    /// unsupported.
    pub fn is_linkable(&self) -> bool {
        *self.linkable.read().expect("record linkability lock poisoned")
    }

    pub(crate) fn mark_linkable(&self) {
        *self
            .linkable
            .write()
            .expect("record linkability lock poisoned") = true;
    }

    // --- Construction and activation ---------------------------------------

    /// Whether an instance has been produced.
    pub fn is_constructed(&self) -> bool {
        self.instance
            .lock()
            .expect("record construction lock poisoned")
            .is_some()
    }

    /// The constructed instance, if any.
    pub fn instance(&self) -> Option<PluginInstance> {
        self.instance
            .lock()
            .expect("record construction lock poisoned")
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        if active {
            self.ever_activated.store(true, Ordering::SeqCst);
        }
        self.active.store(active, Ordering::SeqCst);
    }

    /// Derived lifecycle state for observability.
    pub fn state(&self) -> PluginState {
        if self.is_active() {
            return PluginState::Active;
        }
        if self.is_constructed() {
            if self.ever_activated.load(Ordering::SeqCst) {
                return PluginState::Inactive;
            }
            return PluginState::Constructed;
        }
        if self.is_linkable() {
            return PluginState::Linkable;
        }
        if self.is_resolved() {
            return PluginState::Resolved;
        }
        PluginState::Registered
    }

    /// Produces the plugin instance.
    ///
    /// The linkability check precedes the construction lock, respecting the
    /// lock order; linkability is monotonic so the check cannot go stale. A
    /// second construction returns the existing instance with a warning.
    pub(crate) fn construct(&self, args: &InitArgs) -> Result<PluginInstance, PluginSystemError> {
        if !self.is_linkable() {
            return Err(PluginSystemError::Unlinkable {
                plugin_id: self.id().to_string(),
            });
        }
        let mut slot = self.instance.lock().expect("record construction lock poisoned");
        if let Some(existing) = slot.as_ref() {
            log::warn!(
                "Plugin '{}' constructed more than once; returning the existing instance",
                self.id()
            );
            return Ok(existing.clone());
        }
        let instance = match self.descriptor.constructor() {
            Some(ctor) => ctor(args).map_err(|source| PluginSystemError::ConstructionError {
                plugin_id: self.id().to_string(),
                source,
            })?,
            // Plugins without a construction callback get a unit instance.
            None => Arc::new(()) as PluginInstance,
        };
        *slot = Some(instance.clone());
        Ok(instance)
    }

    /// Runs the activator list in `(priority, declaration index)` order.
    ///
    /// On failure the cursor remembers where it stopped, so a retry resumes
    /// at the failed hook instead of re-running earlier ones.
    pub(crate) fn call_activators(
        &self,
        instance: &PluginInstance,
        args: &InitArgs,
    ) -> Result<(), PluginSystemError> {
        let mut guard = self.activators.lock().expect("record activators lock poisoned");
        let cursor = guard.get_or_insert_with(|| HookCursor::new(self.descriptor.activators()));
        Self::run_cursor(cursor, instance, args, |hook_index, source| {
            PluginSystemError::ActivationError {
                plugin_id: self.id().to_string(),
                hook_index,
                source,
            }
        })
    }

    /// Deactivator counterpart of [`Self::call_activators`].
    pub(crate) fn call_deactivators(
        &self,
        instance: &PluginInstance,
        args: &InitArgs,
    ) -> Result<(), PluginSystemError> {
        let mut guard = self
            .deactivators
            .lock()
            .expect("record deactivators lock poisoned");
        let cursor = guard.get_or_insert_with(|| HookCursor::new(self.descriptor.deactivators()));
        Self::run_cursor(cursor, instance, args, |hook_index, source| {
            PluginSystemError::DeactivationError {
                plugin_id: self.id().to_string(),
                hook_index,
                source,
            }
        })
    }

    fn run_cursor(
        cursor: &mut HookCursor,
        instance: &PluginInstance,
        args: &InitArgs,
        wrap: impl Fn(usize, Box<dyn std::error::Error + Send + Sync>) -> PluginSystemError,
    ) -> Result<(), PluginSystemError> {
        while cursor.next < cursor.hooks.len() {
            match (cursor.hooks[cursor.next])(instance, args) {
                Ok(()) => cursor.next += 1,
                Err(source) => return Err(wrap(cursor.next, source)),
            }
        }
        cursor.next = 0;
        Ok(())
    }
}

impl std::fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRecord")
            .field("id", &self.id())
            .field("version", &self.version())
            .field("slot", &self.slot)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
