//! Plugin system for csync
//!
//! Every integration, compiled in or loaded from an artifact, satisfies the
//! [`Plugin`] contract and is addressed by name through a [`PluginRegistry`].
//! Built-ins are registered at startup; external artifacts are discovered in
//! configured directories or loaded on demand with `plugin load`.

pub mod builtin;
pub mod contract;
pub mod discovery;
pub mod external;
pub mod registry;

pub use contract::{Plugin, PluginError, PluginInfo};
pub use discovery::discover_artifacts;
pub use external::{ExternalPlugin, LoadOptions};
pub use registry::{ConflictPolicy, Invocation, PluginOrigin, PluginRegistry, SharedRegistry};
