//! # Plexus Plugin System Errors
//!
//! Defines [`PluginSystemError`], the error type for registry, resolution
//! and lifecycle operations. Dependency and version sub-errors convert into
//! it via `#[from]`.

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::version::VersionError;

type HookCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("A plugin with id '{plugin_id}' is already registered")]
    DuplicateId { plugin_id: String },

    #[error("Invalid plugin descriptor: {message}")]
    InvalidDescriptor { message: String },

    #[error("Plugin '{plugin_id}' is not linkable")]
    Unlinkable { plugin_id: String },

    #[error("Plugin '{plugin_id}' has an unresolved required dependency on '{dependency_id}'")]
    UnresolvedDependency {
        plugin_id: String,
        dependency_id: String,
    },

    #[error("Construction failed for plugin '{plugin_id}': {source}")]
    ConstructionError {
        plugin_id: String,
        #[source]
        source: HookCause,
    },

    #[error("Activator {hook_index} failed for plugin '{plugin_id}': {source}")]
    ActivationError {
        plugin_id: String,
        hook_index: usize,
        #[source]
        source: HookCause,
    },

    #[error("Deactivator {hook_index} failed for plugin '{plugin_id}': {source}")]
    DeactivationError {
        plugin_id: String,
        hook_index: usize,
        #[source]
        source: HookCause,
    },

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Version parsing error: {0}")]
    VersionParsing(#[from] VersionError),

    #[error("The plugin manager is shutting down")]
    ShuttingDown,

    #[error("Operation '{operation}' is not supported")]
    Unsupported { operation: String },

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}
