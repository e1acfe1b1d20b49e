use std::fmt;

use thiserror::Error;

use crate::plugin_system::record::PluginRecord;
use crate::plugin_system::version::VersionRange;

/// Represents a dependency declared by one plugin on another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDependency {
    /// The id of the required plugin
    pub plugin_id: String,

    /// The version range that is acceptable
    pub version_range: VersionRange,

    /// Whether this is a hard requirement or optional dependency
    pub required: bool,
}

/// Error that can occur when resolving dependencies
#[derive(Debug, Error)]
pub enum DependencyError {
    /// The required plugin was not found
    #[error("Required plugin not found: {0}")]
    MissingPlugin(String),

    /// The plugin was found, but the version is incompatible
    #[error("Plugin version mismatch: '{plugin_id}' requires version '{required_range}' but found '{actual_version}'")]
    IncompatibleVersion {
        plugin_id: String,
        required_range: VersionRange,
        actual_version: String,
    },

    /// A binding slot is already taken by a different plugin
    #[error("Dependency slot '{plugin_id}' is already bound")]
    AlreadyBound { plugin_id: String },

    /// Other dependency resolution error
    #[error("Dependency error: {0}")]
    Other(String),
}

impl PluginDependency {
    /// Create a new required dependency with a specific version range
    pub fn required(plugin_id: &str, version_range: VersionRange) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range,
            required: true,
        }
    }

    /// Create a new required dependency with any version
    pub fn required_any(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range: VersionRange::Any,
            required: true,
        }
    }

    /// Create a new optional dependency with a specific version range
    pub fn optional(plugin_id: &str, version_range: VersionRange) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range,
            required: false,
        }
    }

    /// Create a new optional dependency with any version
    pub fn optional_any(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            version_range: VersionRange::Any,
            required: false,
        }
    }

    /// Check if this dependency is compatible with the given plugin version string
    pub fn is_compatible_with(&self, version_str: &str) -> bool {
        self.version_range.matches(version_str)
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirement_type = if self.required { "Requires" } else { "Optional" };
        write!(
            f,
            "{} plugin: {} (version: {})",
            requirement_type, self.plugin_id, self.version_range
        )
    }
}

/// Which binding slot a request fills on its requestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// A declared dependency, bound into the resolved-dependency map.
    Regular,
    /// The synthetic parent dependency, bound into the parent slot (and
    /// mirrored into the resolved-dependency map).
    Parent,
}

/// An outstanding "need X, version in R" emitted by a freshly registered
/// plugin. A request starts pending and becomes satisfied at most once, by
/// binding a candidate record into the requestor's state.
#[derive(Debug, Clone)]
pub struct DependencyRequest {
    requestor: String,
    requestor_slot: usize,
    want: PluginDependency,
    kind: DependencyKind,
    satisfier: Option<String>,
}

impl DependencyRequest {
    pub(crate) fn regular(requestor: &str, requestor_slot: usize, want: PluginDependency) -> Self {
        Self {
            requestor: requestor.to_string(),
            requestor_slot,
            want,
            kind: DependencyKind::Regular,
            satisfier: None,
        }
    }

    pub(crate) fn parent(requestor: &str, requestor_slot: usize, parent_id: &str) -> Self {
        Self {
            requestor: requestor.to_string(),
            requestor_slot,
            // The parent relation is a hard requirement on some version of
            // the named plugin.
            want: PluginDependency::required_any(parent_id),
            kind: DependencyKind::Parent,
            satisfier: None,
        }
    }

    /// Id of the plugin that emitted this request.
    pub fn requestor(&self) -> &str {
        &self.requestor
    }

    pub(crate) fn requestor_slot(&self) -> usize {
        self.requestor_slot
    }

    /// The declared dependency this request is trying to bind.
    pub fn want(&self) -> &PluginDependency {
        &self.want
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    /// Id of the plugin that satisfied this request, once bound.
    pub fn satisfier(&self) -> Option<&str> {
        self.satisfier.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.satisfier.is_none()
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfier.is_some()
    }

    /// Attempts to satisfy this request with `candidate`.
    ///
    /// Succeeds iff the request is still pending, the candidate's id and
    /// version match the declared dependency, and the binding applies
    /// cleanly to the requestor's record. On success the request carries the
    /// satisfier's id and the candidate remembers the request for future
    /// unbinding.
    pub(crate) fn try_satisfy(
        &mut self,
        requestor: &PluginRecord,
        candidate: &PluginRecord,
    ) -> bool {
        if self.is_satisfied() {
            return false;
        }
        if candidate.id() != self.want.plugin_id {
            return false;
        }
        if !self.want.version_range.matches(candidate.version()) {
            return false;
        }

        let applied = match self.kind {
            DependencyKind::Regular => requestor.bind_dependency(candidate, &self.want),
            DependencyKind::Parent => requestor.bind_parent(candidate),
        };

        match applied {
            Ok(()) => {
                self.satisfier = Some(candidate.id().to_string());
                candidate.note_satisfied(self);
                true
            }
            Err(e) => {
                log::debug!(
                    "Request '{}' -> '{}' not satisfiable by '{}': {}",
                    self.requestor,
                    self.want.plugin_id,
                    candidate.id(),
                    e
                );
                false
            }
        }
    }

    /// Undoes a satisfied binding, restoring the pending state.
    ///
    /// This is the inverse of [`Self::try_satisfy`] and exists for the
    /// removal path; registry removal itself is not yet supported.
    pub(crate) fn try_desatisfy(&mut self, requestor: &PluginRecord) -> bool {
        if self.is_pending() {
            return false;
        }
        match self.kind {
            DependencyKind::Regular => {
                requestor.unbind_dependency(&self.want.plugin_id);
            }
            DependencyKind::Parent => {
                requestor.unbind_parent();
                requestor.unbind_dependency(&self.want.plugin_id);
            }
        }
        self.satisfier = None;
        true
    }
}

/// Back-reference kept on a record for each request it satisfied. Removal
/// will walk these to de-satisfy dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatisfiedRef {
    pub requestor: String,
    pub dependency_id: String,
    pub kind: DependencyKind,
}
