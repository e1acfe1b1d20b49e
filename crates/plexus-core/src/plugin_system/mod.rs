//! # Plexus Plugin System
//!
//! Infrastructure for managing runtime-discovered plugins: registration,
//! dependency resolution, linkability analysis and lifecycle driving.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: version range parsing and matching.
//! - **[`dependency`]**: declared dependencies, the pending
//!   dependency-request state machine and resolution errors.
//! - **[`manifest`]**: the raw string-valued metadata a container exposes,
//!   parsed and validated at the boundary.
//! - **[`descriptor`]**: immutable per-plugin metadata with construction
//!   and hook callbacks.
//! - **[`record`]**: mutable per-plugin runtime state (bindings,
//!   linkability, instance, activation cursors).
//! - **[`registry`]**: the identity-keyed record arena and the pending
//!   request list.
//! - **[`resolver`]**: request satisfaction sweeps and the linkability
//!   fixed point.
//! - **[`lifecycle`]**: deterministic initialization order, construction
//!   and activation driving, reverse-order shutdown.
//! - **[`loader`]**: boundary traits for discovery, container loading and
//!   watch events.
//! - **[`pool`]**: bounded worker pool for parallel descriptor analysis.
//! - **[`manager`]**: the orchestrating [`PluginManager`] component.
//! - **[`error`]**: plugin system error types.

pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod pool;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod version;

pub use dependency::{DependencyKind, DependencyRequest, PluginDependency};
pub use descriptor::{DescriptorBuilder, PluginDescriptor, PluginInstance, PluginKind};
pub use error::PluginSystemError;
pub use lifecycle::{InitArgs, InitReport, LifecycleDriver};
pub use loader::{ContainerLoader, DiscoveredPlugin, WatchEvent};
pub use manager::{DefaultPluginManager, PluginManager};
pub use manifest::PluginManifest;
pub use pool::AnalysisPool;
pub use record::{PluginRecord, PluginState};
pub use registry::PluginRegistry;
pub use resolver::DependencyResolver;
pub use version::VersionRange;

// Test module declaration
#[cfg(test)]
mod tests;
