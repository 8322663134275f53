//! The plugin contract shared by built-in and external plugins

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name and description of a plugin
///
/// The name is the registry key; the description is shown by `plugin list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique registry key (e.g. "jira")
    pub name: String,
    /// Human-readable description
    pub description: String,
}

impl PluginInfo {
    /// Create plugin info from a name and description
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Errors raised by a plugin's own `init` or `execute`
///
/// The registry wraps these without reinterpretation, so the operator sees
/// exactly what the plugin reported.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Malformed sub-command or arguments
    #[error("{0}")]
    Usage(String),

    /// Required credential or setting missing from the environment
    #[error("{0} is not set")]
    MissingCredential(String),

    /// Transport-level HTTP failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API answered with an unexpected status
    #[error("unexpected response from {service}: {status}: {body}")]
    Api {
        /// Service that answered (e.g. "Jira")
        service: &'static str,
        /// HTTP status line
        status: String,
        /// Response body, possibly empty
        body: String,
    },

    /// Response could not be decoded
    #[error("failed to parse response: {0}")]
    Decode(String),

    /// External plugin broke the wire protocol
    #[error("plugin protocol error: {0}")]
    Protocol(String),

    /// External plugin reported a failure
    #[error("{0}")]
    Remote(String),

    /// Any other plugin-defined failure
    #[error("{0}")]
    Other(String),
}

/// Capability set every plugin satisfies
///
/// `info` must be side-effect free and stable for a given instance. `init` is
/// called by the registry at most once, right before the first `execute`.
/// `execute` receives the plugin sub-command and its parameters, already split
/// by the dispatcher, and must report bad input as [`PluginError::Usage`].
///
/// Concurrent `execute` calls on one instance are only safe if the
/// implementation itself is reentrant; the registry does not serialize them.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name and description
    fn info(&self) -> PluginInfo;

    /// One-time setup, such as reading credentials
    ///
    /// # Errors
    ///
    /// Returns error if the plugin cannot be made ready
    async fn init(&self) -> Result<(), PluginError>;

    /// Run a plugin sub-command
    ///
    /// # Errors
    ///
    /// Returns error if the arguments are invalid or the action fails
    async fn execute(&self, args: &[String]) -> Result<(), PluginError>;
}

/// Split `args` into a sub-command and its parameters
///
/// # Errors
///
/// Returns a usage error naming `usage` when no sub-command is given
pub fn split_subcommand<'a>(
    args: &'a [String],
    usage: &str,
) -> Result<(&'a str, &'a [String]), PluginError> {
    match args.split_first() {
        Some((command, rest)) => Ok((command.as_str(), rest)),
        None => Err(PluginError::Usage(format!("usage: {usage}"))),
    }
}
