//! Error types for csync

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::plugins::PluginError;

/// Result type alias for csync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the plugin registry and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// No plugin is registered under the name
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    /// External artifact could not be opened or started
    #[error("failed to load plugin {}: {cause}", path.display())]
    PluginLoadFailed {
        /// Artifact path given by the operator
        path: PathBuf,
        /// What went wrong
        cause: String,
    },

    /// Artifact answered but does not export the plugin entry point
    #[error("plugin {} does not export a 'PluginInstance' entry point", path.display())]
    PluginEntryPointMissing {
        /// Artifact path given by the operator
        path: PathBuf,
    },

    /// Artifact exports the entry point but does not satisfy the plugin contract
    #[error("plugin {} does not satisfy the plugin contract: {reason}", path.display())]
    PluginContractMismatch {
        /// Artifact path given by the operator
        path: PathBuf,
        /// Which part of the contract is violated
        reason: String,
    },

    /// Plugin `init` failed
    #[error("plugin '{name}' failed to initialize: {source}")]
    PluginInitFailed {
        /// Registry name of the plugin
        name: String,
        /// Error reported by the plugin; shared with later calls that hit the
        /// cached failure
        #[source]
        source: Arc<PluginError>,
    },

    /// Plugin `execute` failed
    #[error("plugin '{name}' failed: {source}")]
    PluginExecutionFailed {
        /// Registry name of the plugin
        name: String,
        /// Error reported by the plugin
        #[source]
        source: PluginError,
    },

    /// A plugin is already registered under the name and conflicts are rejected
    #[error("a plugin named '{0}' is already registered")]
    PluginNameConflict(String),

    /// Plugin violates the contract in a way detected at registration
    #[error("invalid plugin: {0}")]
    InvalidPlugin(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Desktop notification could not be shown
    #[error("notification failed: {0}")]
    Notification(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Name of the plugin this error is about, if any
    #[must_use]
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            Self::PluginNotFound(name)
            | Self::PluginNameConflict(name)
            | Self::PluginInitFailed { name, .. }
            | Self::PluginExecutionFailed { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The plugin's own error, for failures that originate inside a plugin
    #[must_use]
    pub fn plugin_source(&self) -> Option<&PluginError> {
        match self {
            Self::PluginInitFailed { source, .. } => Some(source.as_ref()),
            Self::PluginExecutionFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
