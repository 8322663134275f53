//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use csync::{Plugin, PluginError, PluginInfo};

/// In-process plugin that records its calls
pub struct MockPlugin {
    info: PluginInfo,
    execute_error: Option<String>,
    pub init_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
}

impl MockPlugin {
    pub fn new(name: &str, description: &str) -> Arc<Self> {
        Arc::new(Self {
            info: PluginInfo::new(name, description),
            execute_error: None,
            init_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
        })
    }

    /// A plugin whose `execute` always fails with `message`
    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            info: PluginInfo::new(name, "Always fails"),
            execute_error: Some(message.to_string()),
            init_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
        })
    }

    pub fn inits(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn info(&self) -> PluginInfo {
        self.info.clone()
    }

    async fn init(&self) -> Result<(), PluginError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, _args: &[String]) -> Result<(), PluginError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        match &self.execute_error {
            Some(message) => Err(PluginError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

/// Address of the plugin object, for identity checks
pub fn plugin_addr(plugin: &Arc<dyn Plugin>) -> *const () {
    Arc::as_ptr(plugin).cast::<()>()
}

/// Owned argument list
pub fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// The reference artifact shipped in `demos/plugins`
pub fn demo_artifact() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/plugins/demo.sh")
}

/// Write a shell artifact into `dir`
pub fn write_artifact(dir: &Path, file_name: &str, body: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, body).expect("failed to write test artifact");
    path
}

/// Shell artifact that answers `describe` with `handshake` and succeeds otherwise
pub fn handshake_script(handshake: &str) -> String {
    format!(
        "read -r request\ncase \"$request\" in\n  *describe*) echo '{handshake}' ;;\n  *) echo '{{\"ok\":true}}' ;;\nesac\n"
    )
}
