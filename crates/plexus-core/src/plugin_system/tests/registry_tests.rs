#![cfg(test)]

use crate::plugin_system::dependency::{DependencyKind, PluginDependency};
use crate::plugin_system::descriptor::DescriptorBuilder;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::tests::common::{descriptor, descriptor_with_deps};

#[tokio::test]
async fn test_registry_starts_empty() {
    let registry = PluginRegistry::new();
    assert!(registry.is_empty().await);
    assert_eq!(registry.len().await, 0);
    assert_eq!(registry.pending_count().await, 0);
    assert!(registry.lookup("anything").await.is_none());
}

#[tokio::test]
async fn test_insert_and_lookup() {
    let registry = PluginRegistry::new();
    let record = registry.insert(descriptor("demo", "1.0")).await.unwrap();
    assert_eq!(record.id(), "demo");
    assert_eq!(record.version(), "1.0");

    assert!(registry.contains("demo").await);
    assert_eq!(registry.len().await, 1);
    let found = registry.lookup("demo").await.unwrap();
    assert_eq!(found.id(), "demo");
}

#[tokio::test]
async fn test_duplicate_insert_preserves_first_record() {
    let registry = PluginRegistry::new();
    registry.insert(descriptor("demo", "1.0")).await.unwrap();
    let pending_before = registry.pending_count().await;

    let result = registry.insert(descriptor("demo", "2.0")).await;
    assert!(matches!(
        result,
        Err(PluginSystemError::DuplicateId { ref plugin_id }) if plugin_id == "demo"
    ));

    // The earlier record survives untouched, the pending list is unchanged.
    assert_eq!(registry.len().await, 1);
    assert_eq!(registry.lookup("demo").await.unwrap().version(), "1.0");
    assert_eq!(registry.pending_count().await, pending_before);
}

#[tokio::test]
async fn test_records_iterate_in_insertion_order() {
    let registry = PluginRegistry::new();
    for id in ["one", "two", "three"] {
        registry.insert(descriptor(id, "1.0")).await.unwrap();
    }
    let ids: Vec<String> = registry
        .records()
        .await
        .iter()
        .map(|r| r.id().to_string())
        .collect();
    assert_eq!(ids, vec!["one", "two", "three"]);
    assert_eq!(registry.plugin_ids().await, ids);
}

#[tokio::test]
async fn test_insert_emits_requests_for_deps_and_parent() {
    let registry = PluginRegistry::new();
    let child = DescriptorBuilder::new("child", "1.0")
        .parent("base")
        .dependency(PluginDependency::required_any("core"))
        .dependency(PluginDependency::optional_any("extras"))
        .build()
        .unwrap();
    registry.insert(child).await.unwrap();

    let pending = registry.pending_requests().await;
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|req| req.requestor() == "child"));
    assert!(pending.iter().all(|req| req.is_pending()));

    let regular: Vec<&str> = pending
        .iter()
        .filter(|req| req.kind() == DependencyKind::Regular)
        .map(|req| req.want().plugin_id.as_str())
        .collect();
    assert_eq!(regular, vec!["core", "extras"]);

    let parent: Vec<&str> = pending
        .iter()
        .filter(|req| req.kind() == DependencyKind::Parent)
        .map(|req| req.want().plugin_id.as_str())
        .collect();
    assert_eq!(parent, vec!["base"]);
}

#[tokio::test]
async fn test_insert_without_deps_emits_nothing() {
    let registry = PluginRegistry::new();
    registry.insert(descriptor("standalone", "1.0")).await.unwrap();
    assert_eq!(registry.pending_count().await, 0);
}

#[tokio::test]
async fn test_remove_is_unsupported() {
    let registry = PluginRegistry::new();
    registry.insert(descriptor("demo", "1.0")).await.unwrap();
    let result = registry.remove("demo").await;
    assert!(matches!(
        result,
        Err(PluginSystemError::Unsupported { ref operation }) if operation == "remove"
    ));
    // Still registered.
    assert!(registry.contains("demo").await);
}

#[tokio::test]
async fn test_changed_wakes_on_insert() {
    let registry = std::sync::Arc::new(PluginRegistry::new());
    let waiter = {
        let registry = registry.clone();
        tokio::spawn(async move {
            registry.changed().await;
        })
    };
    // Give the waiter a chance to register interest.
    tokio::task::yield_now().await;
    registry.insert(descriptor("demo", "1.0")).await.unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
        .await
        .expect("waiter should be woken by the insert")
        .unwrap();
}

#[tokio::test]
async fn test_fresh_record_state() {
    let registry = PluginRegistry::new();
    let record = registry
        .insert(descriptor_with_deps(
            "demo",
            "1.0",
            vec![PluginDependency::required_any("missing")],
        ))
        .await
        .unwrap();
    assert!(!record.is_resolved());
    assert!(!record.is_linkable());
    assert!(!record.is_constructed());
    assert!(!record.is_active());
}
