//! Plugin registry and lifecycle manager
//!
//! Owns the mapping from plugin name to instance. Built-ins are registered
//! eagerly but initialized lazily: `init` runs right before a plugin's first
//! `execute`, so one integration with missing credentials never blocks the
//! others.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::builtin;
use super::contract::{Plugin, PluginError, PluginInfo};
use super::external::{self, LoadOptions};
use crate::{Error, Result};

/// What happens when a plugin is registered under a name already in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Later registration replaces the earlier one (last-write-wins)
    #[default]
    Replace,
    /// Later registration fails with [`Error::PluginNameConflict`]
    Reject,
}

impl ConflictPolicy {
    /// Convert to string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "reject" => Ok(Self::Reject),
            other => Err(Error::Config(format!(
                "invalid conflict policy: {other} (expected replace or reject)"
            ))),
        }
    }
}

/// Where a registered plugin came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOrigin {
    /// Compiled into this binary
    Builtin,
    /// Registered in-process by the host through [`PluginRegistry::register`]
    InProcess,
    /// Loaded from an operator-supplied artifact
    External(PathBuf),
}

impl fmt::Display for PluginOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::InProcess => write!(f, "in-process"),
            Self::External(path) => write!(f, "external:{}", path.display()),
        }
    }
}

#[derive(Debug)]
enum InitState {
    Pending,
    Ready,
    Failed(Arc<PluginError>),
}

struct RegisteredPlugin {
    plugin: Arc<dyn Plugin>,
    info: PluginInfo,
    origin: PluginOrigin,
    init: Arc<Mutex<InitState>>,
}

/// A resolved plugin, detached from the registry so it can run without
/// holding any registry borrow or lock
pub struct Invocation {
    name: String,
    plugin: Arc<dyn Plugin>,
    init: Arc<Mutex<InitState>>,
}

impl Invocation {
    /// Registry name of the plugin about to run
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initialize the plugin if needed, then execute it
    ///
    /// # Errors
    ///
    /// Returns `PluginInitFailed` or `PluginExecutionFailed` wrapping the
    /// plugin's own error
    pub async fn run(self, args: &[String]) -> Result<()> {
        self.ensure_initialized().await?;

        tracing::info!(plugin = %self.name, args = args.len(), "executing plugin");
        self.plugin
            .execute(args)
            .await
            .map_err(|source| Error::PluginExecutionFailed {
                name: self.name.clone(),
                source,
            })
    }

    async fn ensure_initialized(&self) -> Result<()> {
        // Held across `init` so concurrent first calls initialize once
        let mut state = self.init.lock().await;

        match &*state {
            InitState::Ready => return Ok(()),
            InitState::Failed(source) => {
                return Err(Error::PluginInitFailed {
                    name: self.name.clone(),
                    source: Arc::clone(source),
                });
            }
            InitState::Pending => {}
        }

        tracing::debug!(plugin = %self.name, "initializing plugin");
        match self.plugin.init().await {
            Ok(()) => {
                *state = InitState::Ready;
                Ok(())
            }
            Err(source) => {
                tracing::warn!(plugin = %self.name, error = %source, "plugin init failed");
                let source = Arc::new(source);
                *state = InitState::Failed(Arc::clone(&source));
                Err(Error::PluginInitFailed {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }
}

/// Name to plugin mapping
///
/// At most one plugin occupies a name. Registering a second plugin under the
/// same name follows the registry's [`ConflictPolicy`].
pub struct PluginRegistry {
    plugins: HashMap<String, RegisteredPlugin>,
    conflict_policy: ConflictPolicy,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Create an empty registry with last-write-wins conflicts
    #[must_use]
    pub fn new() -> Self {
        Self::with_conflict_policy(ConflictPolicy::default())
    }

    /// Create an empty registry with the given conflict policy
    #[must_use]
    pub fn with_conflict_policy(conflict_policy: ConflictPolicy) -> Self {
        Self {
            plugins: HashMap::new(),
            conflict_policy,
        }
    }

    /// Conflict policy applied to `register` and `load_external`
    #[must_use]
    pub const fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    /// Register every compiled-in plugin
    ///
    /// Built-ins always replace earlier built-ins, so calling this twice
    /// leaves the same set of names. A name held by any other origin follows
    /// the registry's conflict policy. `init` is deferred to first execution.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPlugin` if a built-in violates the contract, or
    /// `PluginNameConflict` if a non-built-in holds the name and the policy
    /// is [`ConflictPolicy::Reject`]
    pub fn register_builtins(&mut self) -> Result<()> {
        for plugin in builtin::builtin_plugins() {
            let held_by_builtin = self
                .plugins
                .get(&plugin.info().name)
                .is_none_or(|existing| existing.origin == PluginOrigin::Builtin);
            let policy = if held_by_builtin {
                ConflictPolicy::Replace
            } else {
                self.conflict_policy
            };

            self.insert(plugin, PluginOrigin::Builtin, policy)?;
        }

        tracing::debug!(count = self.plugins.len(), "built-in plugins registered");
        Ok(())
    }

    /// Register an in-process plugin under the name from its `info`
    ///
    /// # Errors
    ///
    /// Returns `InvalidPlugin` for an empty name, or `PluginNameConflict` if
    /// the name is taken and the policy is [`ConflictPolicy::Reject`]
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<PluginInfo> {
        let policy = self.conflict_policy;
        self.insert(plugin, PluginOrigin::InProcess, policy)
    }

    /// Load a plugin artifact from `path` and register it
    ///
    /// The registry is left untouched if any step fails.
    ///
    /// # Errors
    ///
    /// Returns `PluginLoadFailed`, `PluginEntryPointMissing`,
    /// `PluginContractMismatch` or `PluginNameConflict`
    pub async fn load_external(&mut self, path: &Path, options: &LoadOptions) -> Result<PluginInfo> {
        tracing::info!(path = %path.display(), "loading external plugin");

        let plugin = external::load(path, options).await?;
        let policy = self.conflict_policy;
        self.insert(
            Arc::new(plugin),
            PluginOrigin::External(path.to_path_buf()),
            policy,
        )
    }

    /// Load several artifacts, logging and skipping any that fail
    ///
    /// Returns the plugins that were registered
    pub async fn load_all_external(
        &mut self,
        paths: &[PathBuf],
        options: &LoadOptions,
    ) -> Vec<PluginInfo> {
        let mut loaded = Vec::new();

        for path in paths {
            match self.load_external(path, options).await {
                Ok(info) => loaded.push(info),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping external plugin");
                }
            }
        }

        loaded
    }

    /// Snapshot of registered plugins, sorted by name
    #[must_use]
    pub fn list(&self) -> Vec<PluginInfo> {
        let mut infos: Vec<PluginInfo> = self.plugins.values().map(|p| p.info.clone()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Look up the plugin registered under `name`
    ///
    /// # Errors
    ///
    /// Returns `PluginNotFound` if no plugin has that name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Plugin>> {
        self.plugins
            .get(name)
            .map(|p| Arc::clone(&p.plugin))
            .ok_or_else(|| Error::PluginNotFound(name.to_string()))
    }

    /// Resolve `name` into an [`Invocation`] that can run on its own
    ///
    /// # Errors
    ///
    /// Returns `PluginNotFound` if no plugin has that name
    pub fn prepare(&self, name: &str) -> Result<Invocation> {
        let Some(registered) = self.plugins.get(name) else {
            tracing::debug!(plugin = %name, "plugin not found");
            return Err(Error::PluginNotFound(name.to_string()));
        };

        Ok(Invocation {
            name: registered.info.name.clone(),
            plugin: Arc::clone(&registered.plugin),
            init: Arc::clone(&registered.init),
        })
    }

    /// Run the plugin registered under `name` with `args`
    ///
    /// No retry or timeout is added; the plugin's result is returned as is.
    ///
    /// # Errors
    ///
    /// Returns `PluginNotFound` without invoking anything, or the plugin's
    /// init or execution failure
    pub async fn execute_by_name(&self, name: &str, args: &[String]) -> Result<()> {
        self.prepare(name)?.run(args).await
    }

    /// Where the plugin registered under `name` came from
    #[must_use]
    pub fn origin(&self, name: &str) -> Option<&PluginOrigin> {
        self.plugins.get(name).map(|p| &p.origin)
    }

    /// Whether a plugin is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Number of registered plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugins are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn insert(
        &mut self,
        plugin: Arc<dyn Plugin>,
        origin: PluginOrigin,
        policy: ConflictPolicy,
    ) -> Result<PluginInfo> {
        let info = plugin.info();
        if info.name.trim().is_empty() {
            return Err(Error::InvalidPlugin(format!(
                "plugin '{}' ({origin}) has an empty name",
                info.description
            )));
        }

        if let Some(existing) = self.plugins.get(&info.name) {
            if policy == ConflictPolicy::Reject {
                tracing::debug!(plugin = %info.name, %policy, %origin, "duplicate plugin rejected");
                return Err(Error::PluginNameConflict(info.name));
            }

            if existing.origin == origin {
                tracing::debug!(plugin = %info.name, %origin, "re-registering plugin");
            } else {
                tracing::warn!(
                    plugin = %info.name,
                    previous = %existing.origin,
                    replacement = %origin,
                    "plugin name already registered, replacing"
                );
            }
        }

        tracing::info!(
            plugin = %info.name,
            %origin,
            description = %info.description,
            "registered plugin"
        );

        self.plugins.insert(
            info.name.clone(),
            RegisteredPlugin {
                plugin,
                info: info.clone(),
                origin,
                init: Arc::new(Mutex::new(InitState::Pending)),
            },
        );

        Ok(info)
    }
}

/// Registry handle for hosts that serve several commands at once
///
/// Writers take an exclusive lock; `execute_by_name` only holds the read lock
/// while resolving, so plugins run without blocking registration.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<RwLock<PluginRegistry>>,
}

impl SharedRegistry {
    /// Wrap an existing registry
    #[must_use]
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Snapshot of registered plugins, sorted by name
    pub async fn list(&self) -> Vec<PluginInfo> {
        self.inner.read().await.list()
    }

    /// Look up the plugin registered under `name`
    ///
    /// # Errors
    ///
    /// Returns `PluginNotFound` if no plugin has that name
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn Plugin>> {
        self.inner.read().await.resolve(name)
    }

    /// Register an in-process plugin
    ///
    /// # Errors
    ///
    /// See [`PluginRegistry::register`]
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> Result<PluginInfo> {
        self.inner.write().await.register(plugin)
    }

    /// Load and register an external plugin
    ///
    /// The handshake runs before the write lock is taken.
    ///
    /// # Errors
    ///
    /// See [`PluginRegistry::load_external`]
    pub async fn load_external(&self, path: &Path, options: &LoadOptions) -> Result<PluginInfo> {
        let plugin = external::load(path, options).await?;

        let mut registry = self.inner.write().await;
        let policy = registry.conflict_policy;
        registry.insert(
            Arc::new(plugin),
            PluginOrigin::External(path.to_path_buf()),
            policy,
        )
    }

    /// Run the plugin registered under `name`
    ///
    /// # Errors
    ///
    /// See [`PluginRegistry::execute_by_name`]
    pub async fn execute_by_name(&self, name: &str, args: &[String]) -> Result<()> {
        let invocation = self.inner.read().await.prepare(name)?;
        invocation.run(args).await
    }
}
