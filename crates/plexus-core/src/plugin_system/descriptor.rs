use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::lifecycle::InitArgs;

/// A constructed plugin instance, opaque to the core.
pub type PluginInstance = Arc<dyn Any + Send + Sync>;

/// Result type for user-supplied hooks.
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Construction callback supplied at the boundary.
pub type ConstructorFn =
    Arc<dyn Fn(&InitArgs) -> Result<PluginInstance, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Activator/deactivator callback supplied at the boundary.
pub type HookFn = Arc<dyn Fn(&PluginInstance, &InitArgs) -> HookResult + Send + Sync>;

/// Whether a plugin takes part in initialization or only serves as a
/// dependency for others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginKind {
    #[default]
    Standard,
    /// Library plugins are registered and resolvable but never constructed
    /// or activated.
    Library,
}

/// An activator or deactivator hook with its ordering priority.
///
/// Lower priorities run first; hooks with equal priority run in declaration
/// order.
#[derive(Clone)]
pub struct Hook {
    pub priority: i32,
    pub callback: HookFn,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Immutable metadata describing a plugin, created once per plugin at
/// discovery time.
///
/// Identity, version and the declared dependency sequence are frozen at
/// construction; hashing and equality use only those fields.
#[derive(Clone)]
pub struct PluginDescriptor {
    id: String,
    version: String,
    description: String,
    author: String,
    parent: Option<String>,
    dependencies: Vec<PluginDependency>,
    kind: PluginKind,
    constructor: Option<ConstructorFn>,
    activators: Vec<Hook>,
    deactivators: Vec<Hook>,
}

impl PluginDescriptor {
    /// Unique identity of the plugin.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version string, compared byte-wise by exact version ranges.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Id of the declared parent plugin, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Declared dependencies in declaration order.
    pub fn dependencies(&self) -> &[PluginDependency] {
        &self.dependencies
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Library plugins hold their place in the dependency order but are
    /// skipped by construction and activation.
    pub fn should_initialize(&self) -> bool {
        self.kind != PluginKind::Library
    }

    pub fn constructor(&self) -> Option<&ConstructorFn> {
        self.constructor.as_ref()
    }

    pub fn activators(&self) -> &[Hook] {
        &self.activators
    }

    pub fn deactivators(&self) -> &[Hook] {
        &self.deactivators
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("parent", &self.parent)
            .field("dependencies", &self.dependencies)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PluginDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.version == other.version
            && self.dependencies == other.dependencies
    }
}

impl Eq for PluginDescriptor {}

impl Hash for PluginDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
        for dep in &self.dependencies {
            dep.plugin_id.hash(state);
            dep.version_range.to_string().hash(state);
            dep.required.hash(state);
        }
    }
}

/// Builder for descriptors constructed programmatically at the boundary.
pub struct DescriptorBuilder {
    id: String,
    version: String,
    description: String,
    author: String,
    parent: Option<String>,
    dependencies: Vec<PluginDependency>,
    kind: PluginKind,
    constructor: Option<ConstructorFn>,
    activators: Vec<Hook>,
    deactivators: Vec<Hook>,
}

impl DescriptorBuilder {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            description: String::new(),
            author: String::new(),
            parent: None,
            dependencies: Vec::new(),
            kind: PluginKind::Standard,
            constructor: None,
            activators: Vec::new(),
            deactivators: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    pub fn parent(mut self, parent_id: &str) -> Self {
        self.parent = Some(parent_id.to_string());
        self
    }

    pub fn dependency(mut self, dep: PluginDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn kind(mut self, kind: PluginKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&InitArgs) -> Result<PluginInstance, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    pub fn activator<F>(mut self, priority: i32, f: F) -> Self
    where
        F: Fn(&PluginInstance, &InitArgs) -> HookResult + Send + Sync + 'static,
    {
        self.activators.push(Hook {
            priority,
            callback: Arc::new(f),
        });
        self
    }

    pub fn deactivator<F>(mut self, priority: i32, f: F) -> Self
    where
        F: Fn(&PluginInstance, &InitArgs) -> HookResult + Send + Sync + 'static,
    {
        self.deactivators.push(Hook {
            priority,
            callback: Arc::new(f),
        });
        self
    }

    /// Validates and freezes the descriptor.
    pub fn build(self) -> Result<PluginDescriptor, PluginSystemError> {
        if self.id.is_empty() {
            return Err(PluginSystemError::InvalidDescriptor {
                message: "plugin id must not be empty".to_string(),
            });
        }
        if self.version.is_empty() {
            return Err(PluginSystemError::InvalidDescriptor {
                message: format!("plugin '{}' has an empty version", self.id),
            });
        }
        if let Some(parent) = &self.parent {
            if parent.is_empty() {
                return Err(PluginSystemError::InvalidDescriptor {
                    message: format!("plugin '{}' declares an empty parent id", self.id),
                });
            }
        }
        for dep in &self.dependencies {
            if dep.plugin_id.is_empty() {
                return Err(PluginSystemError::InvalidDescriptor {
                    message: format!("plugin '{}' declares a dependency with an empty id", self.id),
                });
            }
        }
        Ok(PluginDescriptor {
            id: self.id,
            version: self.version,
            description: self.description,
            author: self.author,
            parent: self.parent,
            dependencies: self.dependencies,
            kind: self.kind,
            constructor: self.constructor,
            activators: self.activators,
            deactivators: self.deactivators,
        })
    }
}
