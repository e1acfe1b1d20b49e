//! # Plexus Core
//!
//! Core library for the Plexus runtime plugin manager.
//!
//! The heart of the crate is a concurrent dependency resolver and lifecycle
//! state machine for plugins discovered at runtime: plugins declare an
//! identity, a version, an optional parent and a set of required/optional
//! dependencies, and the [`plugin_system`] drives each of them from
//! registration through resolution, linkability, construction and
//! activation. Discovery, container loading and filesystem watching are
//! external collaborators consumed through the boundary traits in
//! [`plugin_system::loader`].

pub mod kernel;
pub mod plugin_system;

// Re-export key public types for easier use by embedders and plugins.
pub use kernel::component::KernelComponent;
pub use kernel::error::Error as KernelError;
pub use plugin_system::{
    DefaultPluginManager, DependencyResolver, PluginDependency, PluginDescriptor, PluginManager,
    PluginRegistry, VersionRange,
};
