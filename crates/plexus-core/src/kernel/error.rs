//! # Plexus Kernel Errors
//!
//! Defines the top-level error type for embedders of the core. Subsystem
//! errors ([`PluginSystemError`]) convert into it via `#[from]`.

use std::result::Result as StdResult;

use crate::plugin_system::error::PluginSystemError;
use thiserror::Error as ThisError;

/// Top-level error type for the Plexus core.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
