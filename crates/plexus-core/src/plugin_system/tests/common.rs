#![cfg(test)]
//! Shared fixtures for plugin system tests.

use std::sync::{Arc, Mutex};

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::descriptor::{DescriptorBuilder, PluginDescriptor};
use crate::plugin_system::version::VersionRange;

pub fn exact(version: &str) -> VersionRange {
    VersionRange::Exact(version.to_string())
}

pub fn descriptor(id: &str, version: &str) -> PluginDescriptor {
    DescriptorBuilder::new(id, version).build().unwrap()
}

pub fn descriptor_with_deps(
    id: &str,
    version: &str,
    deps: Vec<PluginDependency>,
) -> PluginDescriptor {
    let mut builder = DescriptorBuilder::new(id, version);
    for dep in deps {
        builder = builder.dependency(dep);
    }
    builder.build().unwrap()
}

/// Records the order in which hooks fire across plugins.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: &str) {
        self.calls.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// A descriptor whose activator and deactivator append to `log`.
pub fn logging_descriptor(
    id: &str,
    version: &str,
    deps: Vec<PluginDependency>,
    log: &CallLog,
) -> PluginDescriptor {
    let mut builder = DescriptorBuilder::new(id, version);
    for dep in deps {
        builder = builder.dependency(dep);
    }
    let activate_log = log.clone();
    let activate_entry = format!("activate:{id}");
    let deactivate_log = log.clone();
    let deactivate_entry = format!("deactivate:{id}");
    builder
        .activator(0, move |_instance, _args| {
            activate_log.push(&activate_entry);
            Ok(())
        })
        .deactivator(0, move |_instance, _args| {
            deactivate_log.push(&deactivate_entry);
            Ok(())
        })
        .build()
        .unwrap()
}
