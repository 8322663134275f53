//! Plugins compiled into csync
//!
//! Each built-in reads its credentials from the environment in `init`, so a
//! missing token only affects the plugin that needs it.

mod github;
mod jira;
mod slack;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use github::GitHubPlugin;
pub use jira::JiraPlugin;
pub use slack::SlackPlugin;

use super::contract::{Plugin, PluginError};

/// Timeout for requests made by built-in plugins
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Every built-in plugin, freshly constructed
#[must_use]
pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(GitHubPlugin::new()),
        Arc::new(JiraPlugin::new()),
        Arc::new(SlackPlugin::new()),
    ]
}

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Source of environment variables for plugin credentials
#[derive(Clone)]
pub struct Env {
    lookup: Arc<Lookup>,
}

impl Env {
    /// Read from the process environment; empty values count as unset
    #[must_use]
    pub fn process() -> Self {
        Self {
            lookup: Arc::new(|key| std::env::var(key).ok().filter(|v| !v.is_empty())),
        }
    }

    /// Read from a fixed set of pairs
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self {
            lookup: Arc::new(move |key| map.get(key).cloned()),
        }
    }

    /// Value of `key`, if set
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    /// Value of `key`
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` naming the variable if it is unset
    pub fn require(&self, key: &str) -> Result<String, PluginError> {
        self.get(key)
            .ok_or_else(|| PluginError::MissingCredential(key.to_string()))
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env").finish_non_exhaustive()
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("csync/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Return the response if its status is one of `expected`
async fn expect_status(
    service: &'static str,
    response: reqwest::Response,
    expected: &[reqwest::StatusCode],
) -> Result<reqwest::Response, PluginError> {
    let status = response.status();
    if expected.contains(&status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(PluginError::Api {
        service,
        status: status.to_string(),
        body,
    })
}

/// Decode a JSON body, reporting failures as `Decode`
async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PluginError> {
    response
        .json::<T>()
        .await
        .map_err(|e| PluginError::Decode(e.to_string()))
}
