//! csync - contribution sync CLI
//!
//! This library provides the core functionality behind the `csync` binary:
//! - A plugin contract and registry for third-party integrations
//! - Built-in Jira, GitHub and Slack plugins
//! - Loading of external plugin artifacts over a JSON process protocol
//! - YAML configuration and a daily desktop reminder
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  csync CLI                          │
//! │   plugin list │ plugin load │ plugin exec │ ...     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                PluginRegistry                       │
//! │   name → plugin │ lazy init │ conflict policy       │
//! └──────────┬─────────────────────────┬────────────────┘
//!            │                         │
//! ┌──────────▼──────────┐   ┌──────────▼────────────────┐
//! │  Built-in plugins   │   │  External artifacts       │
//! │  jira │ github │    │   │  JSON over stdin/stdout   │
//! │  slack              │   │                           │
//! └─────────────────────┘   └───────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod plugins;
pub mod reminder;

pub use config::Config;
pub use error::{Error, Result};
pub use plugins::{
    ConflictPolicy, Plugin, PluginError, PluginInfo, PluginOrigin, PluginRegistry, SharedRegistry,
};
pub use reminder::{DesktopNotifier, Notifier, Reminder};
