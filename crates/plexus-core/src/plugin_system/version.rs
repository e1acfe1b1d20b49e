use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};

/// Boundary sentinel accepted wherever a version constraint is expected:
/// matches any version.
pub const ANY_VERSION: &str = "[any]";

/// Error type for version parsing
#[derive(Debug)]
pub enum VersionError {
    InvalidFormat,
    ParseError(String),
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidFormat => write!(f, "Invalid version format"),
            VersionError::ParseError(msg) => write!(f, "Version parse error: {}", msg),
        }
    }
}

impl std::error::Error for VersionError {}

/// A constraint on the version of a dependency.
///
/// Plugin versions themselves are opaque strings compared byte-wise; only
/// when a dependency asks for a bounded range does semver semantics apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// Matches every version.
    Any,
    /// Matches exactly one version string, compared byte-wise.
    Exact(String),
    /// Matches a semver requirement such as `^1.2` or `>=2.0, <3.0`.
    Within(VersionReq),
}

impl VersionRange {
    /// Parses a constraint string from the boundary.
    ///
    /// The sentinel `"[any]"` maps to [`VersionRange::Any`]. Strings that
    /// lead with a semver operator (or use wildcards / comma-joined
    /// comparators) parse as [`VersionRange::Within`]; anything else is an
    /// exact, byte-compared version.
    pub fn parse(spec: &str) -> Result<Self, VersionError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(VersionError::InvalidFormat);
        }
        if spec == ANY_VERSION {
            return Ok(VersionRange::Any);
        }
        if Self::looks_like_constraint(spec) {
            let req = VersionReq::parse(spec).map_err(|e| {
                VersionError::ParseError(format!("Invalid version constraint '{}': {}", spec, e))
            })?;
            return Ok(VersionRange::Within(req));
        }
        Ok(VersionRange::Exact(spec.to_string()))
    }

    fn looks_like_constraint(spec: &str) -> bool {
        spec.starts_with(&['^', '~', '>', '<', '='][..])
            || spec.contains(',')
            || spec.contains('*')
    }

    /// Checks whether a concrete version string satisfies this range.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::Exact(v) => v == version,
            VersionRange::Within(req) => match Version::parse(version) {
                Ok(v) => req.matches(&v),
                Err(_) => {
                    log::warn!(
                        "Could not parse version string '{}' for range check against '{}'",
                        version,
                        req
                    );
                    false
                }
            },
        }
    }

    /// True for the unconstrained range.
    pub fn is_any(&self) -> bool {
        matches!(self, VersionRange::Any)
    }

    /// The constraint in its boundary string form.
    pub fn constraint_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::Any => write!(f, "{}", ANY_VERSION),
            VersionRange::Exact(v) => write!(f, "{}", v),
            VersionRange::Within(req) => write!(f, "{}", req),
        }
    }
}

/// Allow parsing directly from a string slice.
impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}
