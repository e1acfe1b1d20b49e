#![cfg(test)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::kernel::component::KernelComponent;
use crate::kernel::error::Error;
use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::lifecycle::InitArgs;
use crate::plugin_system::loader::{
    discovery_channel, ContainerLoader, DiscoveredPlugin, ManifestContainerLoader, WatchEvent,
};
use crate::plugin_system::manager::{DefaultPluginManager, PluginManager};
use crate::plugin_system::pool::AnalysisPool;
use crate::plugin_system::tests::common::{descriptor, descriptor_with_deps};

/// Container loader serving descriptors from a fixed map.
struct StaticLoader {
    descriptors: HashMap<String, PluginDescriptor>,
}

impl StaticLoader {
    fn new(descriptors: Vec<PluginDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            descriptors: descriptors
                .into_iter()
                .map(|d| (d.id().to_string(), d))
                .collect(),
        })
    }
}

#[async_trait]
impl ContainerLoader for StaticLoader {
    async fn load_descriptor(&self, identity: &str) -> Result<PluginDescriptor, PluginSystemError> {
        self.descriptors
            .get(identity)
            .cloned()
            .ok_or_else(|| PluginSystemError::InvalidDescriptor {
                message: format!("no descriptor for '{identity}'"),
            })
    }
}

fn unwrap_plugin_error(err: Error) -> PluginSystemError {
    match err {
        Error::PluginSystem(inner) => inner,
        other => panic!("expected a plugin system error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_register_and_initialize_through_manager() {
    let manager = DefaultPluginManager::new();
    manager
        .register_descriptor(descriptor_with_deps(
            "app",
            "1.0",
            vec![PluginDependency::required_any("core")],
        ))
        .await
        .unwrap();
    manager.register_descriptor(descriptor("core", "1.0")).await.unwrap();

    assert_eq!(manager.plugin_ids().await, vec!["app", "core"]);
    assert_eq!(manager.pending_request_count().await, 0);
    assert!(manager.is_plugin_linkable("app").await);

    let report = manager.initialize_plugins(&InitArgs::new()).await.unwrap();
    assert_eq!(report.order, vec!["core", "app"]);
    assert!(manager.is_plugin_active("app").await);
    assert!(manager.is_plugin_active("core").await);

    manager.shutdown_plugins(&InitArgs::new()).await.unwrap();
    assert!(!manager.is_plugin_active("app").await);
}

#[tokio::test]
async fn test_duplicate_id_surfaces_on_direct_registration() {
    let manager = DefaultPluginManager::new();
    manager.register_descriptor(descriptor("demo", "1.0")).await.unwrap();
    let err = manager
        .register_descriptor(descriptor("demo", "2.0"))
        .await
        .unwrap_err();
    assert!(matches!(
        unwrap_plugin_error(err),
        PluginSystemError::DuplicateId { .. }
    ));
}

#[tokio::test]
async fn test_default_blocklist_rejects_reserved_namespace() {
    let manager = DefaultPluginManager::new();
    let err = manager
        .register_descriptor(descriptor("plexus.sneaky", "1.0"))
        .await
        .unwrap_err();
    assert!(matches!(
        unwrap_plugin_error(err),
        PluginSystemError::InvalidDescriptor { .. }
    ));
    assert!(manager.plugin_ids().await.is_empty());
}

#[tokio::test]
async fn test_custom_blocklist_predicate() {
    let manager = DefaultPluginManager::new()
        .with_blocklist(Arc::new(|identity: &str| identity.contains("forbidden")));
    assert!(manager
        .register_descriptor(descriptor("allowed", "1.0"))
        .await
        .is_ok());
    assert!(manager
        .register_descriptor(descriptor("very-forbidden", "1.0"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_ingest_stream_swallows_failures() {
    let manager = DefaultPluginManager::new();
    let loader = StaticLoader::new(vec![descriptor("a", "1.0"), descriptor("b", "1.0")]);

    let (tx, stream) = discovery_channel(8);
    let feeder = tokio::spawn(async move {
        // "a" twice: the duplicate is logged and dropped. "ghost" has no
        // descriptor, "plexus.x" is blocked.
        for identity in ["a", "b", "a", "ghost", "plexus.x"] {
            tx.send(DiscoveredPlugin::new(identity, loader.clone()))
                .await
                .unwrap();
        }
    });

    let registered = manager.ingest_stream(stream).await.unwrap();
    feeder.await.unwrap();
    assert_eq!(registered, 2);

    let mut ids = manager.plugin_ids().await;
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_is_linearized() {
    let manager = DefaultPluginManager::new();
    let registrations = (0..20)
        .map(|i| manager.register_descriptor(descriptor(&format!("plugin-{i}"), "1.0")));
    let results = futures::future::join_all(registrations).await;
    assert!(results.into_iter().all(|r| r.is_ok()));
    assert_eq!(manager.plugin_ids().await.len(), 20);
}

#[tokio::test]
async fn test_wait_linkable_resolves_on_late_arrival() {
    let manager = DefaultPluginManager::new();
    manager
        .register_descriptor(descriptor_with_deps(
            "app",
            "1.0",
            vec![PluginDependency::required_any("late")],
        ))
        .await
        .unwrap();

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.wait_linkable("app").await })
    };
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished());

    manager.register_descriptor(descriptor("late", "1.0")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("wait_linkable should resolve once the dependency arrives")
        .unwrap();
}

#[tokio::test]
async fn test_watch_loop_registers_additions_and_stops_on_shutdown() {
    let manager = DefaultPluginManager::new();
    let loader = StaticLoader::new(vec![descriptor("watched", "1.0")]);
    let (tx, rx) = tokio::sync::mpsc::channel(8);

    let watcher = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run_watch(rx).await })
    };

    tx.send(WatchEvent::Added(DiscoveredPlugin::new("watched", loader.clone())))
        .await
        .unwrap();
    // Removal is declared but not yet wired; the event is logged and
    // swallowed.
    tx.send(WatchEvent::Removed("watched".to_string())).await.unwrap();

    manager.wait_linkable("watched").await;
    assert!(manager.get_record("watched").await.is_some());

    manager.stop().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), watcher)
        .await
        .expect("watch loop should stop promptly after shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_registration_fails_after_stop() {
    let manager = DefaultPluginManager::new();
    manager.stop().await.unwrap();
    let err = manager
        .register_descriptor(descriptor("too-late", "1.0"))
        .await
        .unwrap_err();
    assert!(matches!(
        unwrap_plugin_error(err),
        PluginSystemError::ShuttingDown
    ));
}

#[tokio::test]
async fn test_construct_plugin_on_demand() {
    let manager = DefaultPluginManager::new();
    manager.register_descriptor(descriptor("solo", "1.0")).await.unwrap();
    let instance = manager
        .construct_plugin("solo", &InitArgs::new())
        .await
        .unwrap();
    assert!(instance.downcast_ref::<()>().is_some());

    // A plugin with unmet requirements refuses on-demand construction.
    manager
        .register_descriptor(descriptor_with_deps(
            "needy",
            "1.0",
            vec![PluginDependency::required_any("absent")],
        ))
        .await
        .unwrap();
    let err = manager
        .construct_plugin("needy", &InitArgs::new())
        .await
        .unwrap_err();
    assert!(matches!(
        unwrap_plugin_error(err),
        PluginSystemError::UnresolvedDependency { .. }
    ));
}

#[tokio::test]
async fn test_dependent_plugins_and_missing_dependencies() {
    let manager = DefaultPluginManager::new();
    manager
        .register_descriptor(descriptor_with_deps(
            "app",
            "1.0",
            vec![
                PluginDependency::required_any("core"),
                PluginDependency::required_any("ghost"),
            ],
        ))
        .await
        .unwrap();
    manager.register_descriptor(descriptor("core", "1.0")).await.unwrap();

    assert_eq!(manager.dependent_plugins("core").await, vec!["app"]);
    assert_eq!(
        manager.missing_dependencies("app").await.unwrap(),
        vec!["ghost".to_string()]
    );
    assert!(manager.missing_dependencies("nobody").await.is_err());
}

#[tokio::test]
async fn test_kernel_component_lifecycle() {
    let manager = DefaultPluginManager::new();
    assert_eq!(KernelComponent::name(&manager), "DefaultPluginManager");
    manager.initialize().await.unwrap();
    manager.start().await.unwrap();
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_manifest_container_loader_reads_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"{{"id": "demo", "version": "1.0", "dependencies": [{{"id": "core", "version": "[any]"}}]}}"#
    )
    .unwrap();

    let loader = ManifestContainerLoader::new(dir.path());
    let descriptor = loader.load_descriptor("demo").await.unwrap();
    assert_eq!(descriptor.id(), "demo");
    assert_eq!(descriptor.dependencies().len(), 1);

    let missing = loader.load_descriptor("absent").await;
    assert!(matches!(
        missing,
        Err(PluginSystemError::InvalidDescriptor { .. })
    ));
}

#[tokio::test]
async fn test_analysis_pool_sizing() {
    assert_eq!(AnalysisPool::new(3).workers(), 3);
    // Zero workers clamps to one so the pool can always make progress.
    assert_eq!(AnalysisPool::new(0).workers(), 1);
    let value = AnalysisPool::new(2).run(async { 7 }).await;
    assert_eq!(value, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_analysis_pool_bounds_concurrency() {
    let pool = AnalysisPool::new(2);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                pool.run(async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
}
