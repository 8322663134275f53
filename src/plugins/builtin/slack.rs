//! Slack integration: post messages through an incoming webhook

use std::sync::OnceLock;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::{Env, expect_status, http_client};
use crate::plugins::contract::{Plugin, PluginError, PluginInfo, split_subcommand};

const USAGE: &str = "csync plugin exec slack send <channel> <message...>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct SlackMessage {
    channel: String,
    text: String,
}

fn parse_args(args: &[String]) -> Result<SlackMessage, PluginError> {
    let (command, rest) = split_subcommand(args, USAGE)?;
    if command != "send" {
        return Err(PluginError::Usage(format!("unknown Slack command: {command}")));
    }

    match rest.split_first() {
        Some((channel, words)) => Ok(SlackMessage {
            channel: channel.clone(),
            text: words.join(" "),
        }),
        None => Err(PluginError::Usage(format!("usage: {USAGE}"))),
    }
}

/// Slack webhook plugin; requires `SLACK_WEBHOOK_URL`
#[derive(Debug)]
pub struct SlackPlugin {
    env: Env,
    client: reqwest::Client,
    webhook_url: OnceLock<String>,
}

impl Default for SlackPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl SlackPlugin {
    /// Create a plugin reading its webhook from the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_env(Env::process())
    }

    /// Create a plugin reading its webhook from `env`
    #[must_use]
    pub fn with_env(env: Env) -> Self {
        Self {
            env,
            client: http_client(),
            webhook_url: OnceLock::new(),
        }
    }
}

#[async_trait]
impl Plugin for SlackPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("slack", "Slack Plugin: Send messages to Slack channels")
    }

    async fn init(&self) -> Result<(), PluginError> {
        let url = self.env.require("SLACK_WEBHOOK_URL")?;
        if self.webhook_url.set(url).is_err() {
            tracing::debug!("slack plugin already initialized");
        }
        tracing::info!("slack plugin initialized");
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> Result<(), PluginError> {
        let message = parse_args(args)?;
        let url = self
            .webhook_url
            .get()
            .ok_or_else(|| PluginError::Other("slack plugin is not initialized".to_string()))?;

        let response = self.client.post(url).json(&message).send().await?;
        expect_status("Slack", response, &[StatusCode::OK, StatusCode::NO_CONTENT]).await?;

        tracing::info!(channel = %message.channel, "message sent to slack");
        println!("Message sent to Slack channel: {}", message.channel);
        Ok(())
    }
}
