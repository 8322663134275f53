//! External plugins loaded from operator-supplied artifacts
//!
//! An artifact is an executable (or a script with a known interpreter) that
//! speaks the JSON protocol in [`protocol`]. Every operation runs in its own
//! short-lived process, so a crashing plugin cannot take csync down with it
//! and nothing needs unloading.
//!
//! Loading follows three checks, each with its own error:
//! 1. the artifact exists and answers a `describe` handshake (`PluginLoadFailed`)
//! 2. the handshake announces [`protocol::ENTRY_POINT`] (`PluginEntryPointMissing`)
//! 3. protocol version, operations and name are valid (`PluginContractMismatch`)

pub mod executor;
pub mod protocol;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use self::executor::{Launcher, exchange, launcher_for};
use self::protocol::{HandshakeError, Request, Response, parse_handshake};
use crate::plugins::contract::{Plugin, PluginError, PluginInfo};
use crate::{Error, Result};

/// Default limit for the `describe` handshake
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for loading an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Limit for the handshake; plugin calls after loading have none
    pub timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

/// Host-side proxy for a loaded artifact
#[derive(Debug, Clone)]
pub struct ExternalPlugin {
    path: PathBuf,
    launcher: Launcher,
    info: PluginInfo,
}

impl ExternalPlugin {
    /// Resolved artifact path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn call(&self, request: &Request) -> std::result::Result<Option<String>, PluginError> {
        let stdout = exchange(&self.launcher, request, None)
            .await
            .map_err(PluginError::Protocol)?;

        Response::parse(&stdout)?.into_result()
    }
}

#[async_trait]
impl Plugin for ExternalPlugin {
    fn info(&self) -> PluginInfo {
        // Served from the handshake; no process is spawned
        self.info.clone()
    }

    async fn init(&self) -> std::result::Result<(), PluginError> {
        if let Some(output) = self.call(&Request::Init).await? {
            tracing::debug!(plugin = %self.info.name, output = %output.trim(), "plugin init output");
        }
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> std::result::Result<(), PluginError> {
        let output = self
            .call(&Request::Execute {
                args: args.to_vec(),
            })
            .await?;

        if let Some(text) = output {
            println!("{}", text.trim_end());
        }
        Ok(())
    }
}

/// Open an artifact, verify it against the plugin contract and return it
///
/// # Errors
///
/// Returns `PluginLoadFailed`, `PluginEntryPointMissing` or
/// `PluginContractMismatch`; see the module docs
pub async fn load(path: &Path, options: &LoadOptions) -> Result<ExternalPlugin> {
    let load_failed = |cause: String| Error::PluginLoadFailed {
        path: path.to_path_buf(),
        cause,
    };

    if !path.is_file() {
        let cause = if path.exists() {
            "not a regular file"
        } else {
            "no such file"
        };
        return Err(load_failed(cause.to_string()));
    }

    let resolved = std::fs::canonicalize(path).map_err(|e| load_failed(e.to_string()))?;
    let launcher = launcher_for(&resolved).map_err(load_failed)?;

    let stdout = exchange(&launcher, &Request::Describe, Some(options.timeout))
        .await
        .map_err(load_failed)?;

    let info = parse_handshake(&stdout).map_err(|e| match e {
        HandshakeError::Malformed(cause) => load_failed(cause),
        HandshakeError::EntryPointMissing => Error::PluginEntryPointMissing {
            path: path.to_path_buf(),
        },
        HandshakeError::ContractMismatch(reason) => Error::PluginContractMismatch {
            path: path.to_path_buf(),
            reason,
        },
    })?;

    tracing::debug!(
        path = %resolved.display(),
        plugin = %info.name,
        program = %launcher.program,
        "plugin handshake accepted"
    );

    Ok(ExternalPlugin {
        path: resolved,
        launcher,
        info,
    })
}
