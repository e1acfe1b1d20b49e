use serde::Deserialize;

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::descriptor::{DescriptorBuilder, HookFn, PluginDescriptor, PluginKind};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::version::VersionRange;

/// Boundary sentinel for "no parent". An empty string means the same.
pub const NO_PARENT: &str = "[none]";

fn default_true() -> bool {
    true
}

fn default_any_version() -> String {
    crate::plugin_system::version::ANY_VERSION.to_string()
}

/// A dependency entry as it appears in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestDependency {
    pub id: String,
    #[serde(default = "default_any_version")]
    pub version: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

/// A named activator/deactivator entry; the container loader resolves the
/// name to an actual callback.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestHook {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
}

/// Plugin category as declared at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ManifestPluginType {
    #[default]
    Standard,
    Library,
}

/// The raw, string-valued metadata a container exposes for a plugin.
///
/// Manifests are parsed and validated at the boundary; the core only ever
/// sees the [`PluginDescriptor`] a manifest converts into. A container
/// without a manifest is rejected before reaching the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    /// Unique identifier for the plugin
    pub id: String,

    /// Plugin version
    pub version: String,

    /// Plugin description
    #[serde(default)]
    pub description: String,

    /// Plugin author
    #[serde(default)]
    pub author: String,

    /// Parent plugin id; `"[none]"` or empty means no parent
    #[serde(default)]
    pub parent: Option<String>,

    /// Declared dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,

    /// STANDARD or LIBRARY
    #[serde(default, rename = "type")]
    pub plugin_type: ManifestPluginType,

    /// Named activator hooks with priorities
    #[serde(default)]
    pub activators: Vec<ManifestHook>,

    /// Named deactivator hooks with priorities
    #[serde(default)]
    pub deactivators: Vec<ManifestHook>,
}

impl PluginManifest {
    /// Parses a manifest from JSON text.
    pub fn from_json_str(data: &str) -> Result<Self, PluginSystemError> {
        serde_json::from_str(data).map_err(|e| PluginSystemError::InvalidDescriptor {
            message: format!("manifest parse error: {}", e),
        })
    }

    /// Converts into a descriptor without binding any hook callbacks.
    pub fn into_descriptor(self) -> Result<PluginDescriptor, PluginSystemError> {
        self.into_descriptor_with(|_| None)
    }

    /// Converts into a descriptor, resolving hook names to callbacks via
    /// `bind`. Names the binder does not know are dropped with a warning.
    pub fn into_descriptor_with<F>(self, bind: F) -> Result<PluginDescriptor, PluginSystemError>
    where
        F: Fn(&str) -> Option<HookFn>,
    {
        let mut builder = DescriptorBuilder::new(&self.id, &self.version)
            .description(&self.description)
            .author(&self.author);

        match &self.parent {
            Some(parent) if !parent.is_empty() && parent != NO_PARENT => {
                builder = builder.parent(parent);
            }
            _ => {}
        }

        for dep in &self.dependencies {
            let version_range = VersionRange::parse(&dep.version).map_err(|e| {
                PluginSystemError::InvalidDescriptor {
                    message: format!(
                        "plugin '{}': dependency '{}' has an invalid version constraint: {}",
                        self.id, dep.id, e
                    ),
                }
            })?;
            builder = builder.dependency(PluginDependency {
                plugin_id: dep.id.clone(),
                version_range,
                required: dep.required,
            });
        }

        if self.plugin_type == ManifestPluginType::Library {
            builder = builder.kind(PluginKind::Library);
        }

        for hook in &self.activators {
            match bind(&hook.name) {
                Some(callback) => {
                    builder = builder.activator(hook.priority, move |instance, args| {
                        callback(instance, args)
                    });
                }
                None => log::warn!(
                    "Plugin '{}': activator '{}' has no bound callback, dropping it",
                    self.id,
                    hook.name
                ),
            }
        }
        for hook in &self.deactivators {
            match bind(&hook.name) {
                Some(callback) => {
                    builder = builder.deactivator(hook.priority, move |instance, args| {
                        callback(instance, args)
                    });
                }
                None => log::warn!(
                    "Plugin '{}': deactivator '{}' has no bound callback, dropping it",
                    self.id,
                    hook.name
                ),
            }
        }

        builder.build()
    }
}
