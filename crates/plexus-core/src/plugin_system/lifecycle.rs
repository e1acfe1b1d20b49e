use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::record::PluginRecord;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::resolver::DependencyResolver;

/// Arguments handed to constructors and hooks during initialization and
/// shutdown: plain string arguments plus arbitrary typed shared data.
#[derive(Default)]
pub struct InitArgs {
    values: HashMap<String, String>,
    shared: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl InitArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string argument
    pub fn set_arg(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Get a string argument
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Set a shared data value
    pub fn set_data<T: 'static + Send + Sync>(&mut self, key: &str, value: T) {
        self.shared.insert(key.to_string(), Box::new(value));
    }

    /// Get a shared data value
    pub fn data<T: 'static + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.shared.get(key).and_then(|v| v.downcast_ref::<T>())
    }
}

impl std::fmt::Debug for InitArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitArgs")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful [`LifecycleDriver::initialize`] run.
#[derive(Debug, Default, Clone)]
pub struct InitReport {
    /// The full initialization order, library plugins included.
    pub order: Vec<String>,
    /// Plugins constructed during this run.
    pub constructed: Vec<String>,
    /// Plugins whose activators all completed during this run.
    pub activated: Vec<String>,
}

/// Drives linkable plugins through construction and activation in
/// dependency order, and back down again on shutdown.
pub struct LifecycleDriver {
    registry: Arc<PluginRegistry>,
    resolver: DependencyResolver,
    post_init_failures: Mutex<Vec<String>>,
}

impl LifecycleDriver {
    pub fn new(registry: Arc<PluginRegistry>, resolver: DependencyResolver) -> Self {
        Self {
            registry,
            resolver,
            post_init_failures: Mutex::new(Vec::new()),
        }
    }

    /// Plugins whose activation failed during the last `initialize` run and
    /// did not recover on the retry pass.
    pub fn post_init_failures(&self) -> Vec<String> {
        self.post_init_failures
            .lock()
            .expect("post-init failure list lock poisoned")
            .clone()
    }

    /// Deterministic topological order over the linkable records:
    /// depth-first from each linkable record in registry insertion order,
    /// dependencies emitted before dependents. Cycle members appear exactly
    /// once, in the order the traversal first completes them.
    pub async fn initialization_order(&self) -> Vec<Arc<PluginRecord>> {
        let inner = self.registry.inner.read().await;
        let mut order = Vec::with_capacity(inner.records.len());
        let mut visited = vec![false; inner.records.len()];

        for record in inner.records.iter() {
            if !record.is_linkable() || visited[record.slot()] {
                continue;
            }
            // Iterative post-order walk.
            visited[record.slot()] = true;
            let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(
                record.slot(),
                record.resolved_dependency_slots(),
                0,
            )];
            while let Some((slot, deps, cursor)) = stack.last_mut() {
                if *cursor < deps.len() {
                    let dep_slot = deps[*cursor];
                    *cursor += 1;
                    if !visited[dep_slot] {
                        visited[dep_slot] = true;
                        stack.push((
                            dep_slot,
                            inner.records[dep_slot].resolved_dependency_slots(),
                            0,
                        ));
                    }
                } else {
                    order.push(inner.records[*slot].clone());
                    stack.pop();
                }
            }
        }
        order
    }

    /// Resolves, links, orders and initializes every linkable plugin.
    ///
    /// Construction failure aborts immediately. The first activation failure
    /// stops the forward pass and is surfaced to the caller, after a single
    /// retry pass over the failed plugin (resuming at the hook that failed);
    /// a retry success leaves the plugin active and clears it from
    /// [`Self::post_init_failures`].
    pub async fn initialize(&self, args: &InitArgs) -> Result<InitReport, PluginSystemError> {
        self.resolver.satisfy_pass().await;
        self.resolver.link_all().await;

        let order = self.initialization_order().await;
        let mut report = InitReport {
            order: order.iter().map(|r| r.id().to_string()).collect(),
            ..Default::default()
        };
        self.post_init_failures
            .lock()
            .expect("post-init failure list lock poisoned")
            .clear();

        let mut first_failure = None;
        for record in &order {
            if !record.descriptor().should_initialize() {
                log::debug!("Skipping library plugin '{}'", record.id());
                continue;
            }
            if record.is_active() {
                continue;
            }
            let instance = match record.instance() {
                Some(existing) => existing,
                None => {
                    let instance = record.construct(args)?;
                    report.constructed.push(record.id().to_string());
                    instance
                }
            };
            match record.call_activators(&instance, args) {
                Ok(()) => {
                    record.set_active(true);
                    report.activated.push(record.id().to_string());
                    log::info!("Plugin '{}' active", record.id());
                }
                Err(e) => {
                    log::warn!("Activation failed for plugin '{}': {}", record.id(), e);
                    self.post_init_failures
                        .lock()
                        .expect("post-init failure list lock poisoned")
                        .push(record.id().to_string());
                    first_failure = Some(e);
                    break;
                }
            }
        }

        match first_failure {
            None => Ok(report),
            Some(error) => {
                self.retry_failed_activations(args).await;
                Err(error)
            }
        }
    }

    /// One retry over the plugins whose activation failed. The activator
    /// cursor resumes at the hook that failed; hooks that already ran are
    /// not re-run. Still-failing plugins stay on the failure list.
    async fn retry_failed_activations(&self, args: &InitArgs) {
        let failed = self.post_init_failures();
        for id in failed {
            let Some(record) = self.registry.lookup(&id).await else {
                continue;
            };
            let Some(instance) = record.instance() else {
                continue;
            };
            match record.call_activators(&instance, args) {
                Ok(()) => {
                    record.set_active(true);
                    self.post_init_failures
                        .lock()
                        .expect("post-init failure list lock poisoned")
                        .retain(|failed_id| failed_id != &id);
                    log::info!("Plugin '{}' active after activation retry", record.id());
                }
                Err(e) => {
                    log::warn!("Activation retry failed for plugin '{}': {}", id, e);
                }
            }
        }
    }

    /// Deactivates active plugins in reverse initialization order.
    ///
    /// A failing deactivator leaves its plugin active (the cursor remembers
    /// where it stopped) and shutdown continues with the remaining plugins.
    pub async fn shutdown(&self, args: &InitArgs) -> Result<(), PluginSystemError> {
        let mut order = self.initialization_order().await;
        order.reverse();

        let mut errors = Vec::new();
        for record in &order {
            if !record.is_active() {
                continue;
            }
            let Some(instance) = record.instance() else {
                continue;
            };
            log::info!("Deactivating plugin '{}'", record.id());
            match record.call_deactivators(&instance, args) {
                Ok(()) => record.set_active(false),
                Err(e) => {
                    log::warn!("Deactivation failed for plugin '{}': {}", record.id(), e);
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            let combined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            Err(PluginSystemError::InternalError(format!(
                "Encountered errors during plugin shutdown: {}",
                combined
            )))
        }
    }
}

impl std::fmt::Debug for LifecycleDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleDriver").finish_non_exhaustive()
    }
}
