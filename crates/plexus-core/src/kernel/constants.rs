//! Process-wide constants.

use std::time::Duration;

/// Library name.
pub const CORE_NAME: &str = "plexus-core";

/// Library version (from Cargo).
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity prefix reserved for the manager itself. The default blocklist
/// predicate rejects descriptors whose id starts with this.
pub const RESERVED_NAMESPACE: &str = "plexus.";

/// Environment variable sizing the descriptor analysis pool.
/// Unset or non-positive values fall back to hardware concurrency.
pub const MAX_THREADS_ENV: &str = "PLUGIN_MANAGER_MAX_THREADS";

/// Bounded wait used by the watch loop so shutdown is observed promptly.
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(500);
