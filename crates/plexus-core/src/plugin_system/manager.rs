use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::descriptor::{PluginDescriptor, PluginInstance};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::lifecycle::{InitArgs, InitReport, LifecycleDriver};
use crate::plugin_system::loader::{DiscoveredPlugin, WatchEvent};
use crate::plugin_system::pool::AnalysisPool;
use crate::plugin_system::record::PluginRecord;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::resolver::DependencyResolver;

/// Predicate rejecting identities before they reach the registry.
pub type BlocklistPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Plugin system component interface
#[async_trait]
pub trait PluginManager: KernelComponent {
    /// Registers a descriptor directly. Duplicate ids and blocked
    /// identities are surfaced to the caller.
    async fn register_descriptor(&self, descriptor: PluginDescriptor) -> Result<()>;
    /// Consumes a discovery stream, analyzing each plugin on the bounded
    /// worker pool. Returns how many plugins were registered; individual
    /// failures are logged and swallowed.
    async fn ingest_stream(&self, stream: ReceiverStream<DiscoveredPlugin>) -> Result<usize>;
    /// Resolves, links and initializes every linkable plugin.
    async fn initialize_plugins(&self, args: &InitArgs) -> Result<InitReport>;
    /// Deactivates active plugins in reverse initialization order.
    async fn shutdown_plugins(&self, args: &InitArgs) -> Result<()>;
    /// Constructs a single plugin on demand.
    async fn construct_plugin(&self, id: &str, args: &InitArgs) -> Result<PluginInstance>;
    async fn get_record(&self, id: &str) -> Option<Arc<PluginRecord>>;
    async fn is_plugin_active(&self, id: &str) -> bool;
    async fn is_plugin_linkable(&self, id: &str) -> bool;
    async fn plugin_ids(&self) -> Vec<String>;
    async fn pending_request_count(&self) -> usize;
    /// Required dependency ids (and parent) still unbound for `id`.
    async fn missing_dependencies(&self, id: &str) -> Result<Vec<String>>;
    /// Ids of plugins that declare a dependency on (or are children of) `id`.
    async fn dependent_plugins(&self, id: &str) -> Vec<String>;
    /// Resolves once the plugin with `id` is linkable, however late it
    /// arrives.
    async fn wait_linkable(&self, id: &str);
}

/// Default implementation of the plugin manager.
pub struct DefaultPluginManager {
    name: &'static str,
    registry: Arc<PluginRegistry>,
    resolver: DependencyResolver,
    driver: Arc<LifecycleDriver>,
    pool: AnalysisPool,
    is_blocked: BlocklistPredicate,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

fn default_blocklist() -> BlocklistPredicate {
    Arc::new(|identity: &str| identity.starts_with(constants::RESERVED_NAMESPACE))
}

impl DefaultPluginManager {
    pub fn new() -> Self {
        Self::with_pool(AnalysisPool::shared())
    }

    /// Builds a manager around an explicit analysis pool.
    pub fn with_pool(pool: AnalysisPool) -> Self {
        let registry = Arc::new(PluginRegistry::new());
        let resolver = DependencyResolver::new(registry.clone());
        let driver = Arc::new(LifecycleDriver::new(registry.clone(), resolver.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            name: "DefaultPluginManager",
            registry,
            resolver,
            driver,
            pool,
            is_blocked: default_blocklist(),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Replaces the blocklist predicate.
    pub fn with_blocklist(mut self, is_blocked: BlocklistPredicate) -> Self {
        self.is_blocked = is_blocked;
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn driver(&self) -> &Arc<LifecycleDriver> {
        &self.driver
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Analyzes one discovered plugin on the pool: load its descriptor,
    /// register it and offer it to the pending requests. Returns whether a
    /// record was registered; every failure is logged and swallowed.
    pub async fn analyze_discovered(&self, discovered: DiscoveredPlugin) -> bool {
        self.pool
            .run(async {
                if self.is_shutting_down() {
                    log::warn!(
                        "Ignoring discovered plugin '{}': manager is shutting down",
                        discovered.identity
                    );
                    return false;
                }
                if (self.is_blocked)(&discovered.identity) {
                    log::warn!("Rejecting blocked plugin identity '{}'", discovered.identity);
                    return false;
                }
                match discovered.loader.load_descriptor(&discovered.identity).await {
                    Ok(descriptor) => match self.registry.insert(descriptor).await {
                        Ok(record) => {
                            self.resolver.satisfy_with(&record).await;
                            true
                        }
                        Err(e) => {
                            log::warn!("Discarding plugin '{}': {}", discovered.identity, e);
                            false
                        }
                    },
                    Err(e) => {
                        log::warn!("Failed to analyze plugin '{}': {}", discovered.identity, e);
                        false
                    }
                }
            })
            .await
    }

    /// Drives add/remove events from the external watcher until the channel
    /// closes or shutdown is signalled. The loop never waits longer than
    /// the poll interval, so shutdown is observed promptly.
    pub async fn run_watch(&self, mut events: mpsc::Receiver<WatchEvent>) {
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(constants::WATCH_POLL_INTERVAL) => {
                    if self.is_shutting_down() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(WatchEvent::Added(discovered)) => {
                        self.analyze_discovered(discovered).await;
                    }
                    Some(WatchEvent::Removed(id)) => {
                        if let Err(e) = self.registry.remove(&id).await {
                            log::warn!("Cannot remove plugin '{}': {}", id, e);
                        }
                    }
                    None => break,
                },
            }
        }
        log::debug!("Watch loop stopped");
    }
}

impl Default for DefaultPluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DefaultPluginManager {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            registry: Arc::clone(&self.registry),
            resolver: self.resolver.clone(),
            driver: Arc::clone(&self.driver),
            pool: self.pool.clone(),
            is_blocked: Arc::clone(&self.is_blocked),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            shutdown_rx: self.shutdown_rx.clone(),
        }
    }
}

impl Debug for DefaultPluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPluginManager")
            .field("name", &self.name)
            .field("workers", &self.pool.workers())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for DefaultPluginManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        log::info!(
            "Plugin manager ready ({} v{}, {} analysis workers)",
            constants::CORE_NAME,
            constants::CORE_VERSION,
            self.pool.workers()
        );
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        // Plugin initialization needs caller-provided arguments; embedders
        // call `initialize_plugins` explicitly.
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.driver.shutdown(&InitArgs::new()).await?;
        Ok(())
    }
}

#[async_trait]
impl PluginManager for DefaultPluginManager {
    async fn register_descriptor(&self, descriptor: PluginDescriptor) -> Result<()> {
        if self.is_shutting_down() {
            return Err(PluginSystemError::ShuttingDown.into());
        }
        if (self.is_blocked)(descriptor.id()) {
            return Err(PluginSystemError::InvalidDescriptor {
                message: format!("plugin identity '{}' is blocked", descriptor.id()),
            }
            .into());
        }
        let record = self.registry.insert(descriptor).await?;
        self.resolver.satisfy_with(&record).await;
        Ok(())
    }

    async fn ingest_stream(&self, mut stream: ReceiverStream<DiscoveredPlugin>) -> Result<usize> {
        let mut tasks = JoinSet::new();
        while let Some(discovered) = stream.next().await {
            let manager = self.clone();
            tasks.spawn(async move { manager.analyze_discovered(discovered).await });
        }
        let mut registered = 0;
        while let Some(outcome) = tasks.join_next().await {
            if matches!(outcome, Ok(true)) {
                registered += 1;
            }
        }
        Ok(registered)
    }

    async fn initialize_plugins(&self, args: &InitArgs) -> Result<InitReport> {
        if self.is_shutting_down() {
            return Err(PluginSystemError::ShuttingDown.into());
        }
        Ok(self.driver.initialize(args).await?)
    }

    async fn shutdown_plugins(&self, args: &InitArgs) -> Result<()> {
        self.driver.shutdown(args).await?;
        Ok(())
    }

    async fn construct_plugin(&self, id: &str, args: &InitArgs) -> Result<PluginInstance> {
        let record = self.resolver.require_linkable(id).await?;
        Ok(record.construct(args)?)
    }

    async fn get_record(&self, id: &str) -> Option<Arc<PluginRecord>> {
        self.registry.lookup(id).await
    }

    async fn is_plugin_active(&self, id: &str) -> bool {
        match self.registry.lookup(id).await {
            Some(record) => record.is_active(),
            None => false,
        }
    }

    async fn is_plugin_linkable(&self, id: &str) -> bool {
        self.resolver.is_linkable(id).await
    }

    async fn plugin_ids(&self) -> Vec<String> {
        self.registry.plugin_ids().await
    }

    async fn pending_request_count(&self) -> usize {
        self.registry.pending_count().await
    }

    async fn missing_dependencies(&self, id: &str) -> Result<Vec<String>> {
        match self.registry.lookup(id).await {
            Some(record) => Ok(record.missing_requirements()),
            None => Err(PluginSystemError::DependencyResolution(
                DependencyError::MissingPlugin(id.to_string()),
            )
            .into()),
        }
    }

    async fn dependent_plugins(&self, id: &str) -> Vec<String> {
        let mut dependents = Vec::new();
        for record in self.registry.records().await {
            let declares = record
                .descriptor()
                .dependencies()
                .iter()
                .any(|dep| dep.plugin_id == id)
                || record.descriptor().parent() == Some(id);
            if declares {
                dependents.push(record.id().to_string());
            }
        }
        dependents
    }

    async fn wait_linkable(&self, id: &str) {
        loop {
            let notified = self.registry.changed();
            tokio::pin!(notified);
            // Register interest before the check so an insert racing with it
            // cannot be missed. The waiter drives its own satisfy pass: the
            // wake-up arrives on insert, possibly before the inserting task
            // has swept the pending list.
            notified.as_mut().enable();
            self.resolver.satisfy_pass().await;
            if self.resolver.is_linkable(id).await {
                return;
            }
            notified.await;
        }
    }
}
