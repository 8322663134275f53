//! GitHub integration: pull request and commit summaries for a repository

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{Env, decode, expect_status, http_client};
use crate::plugins::contract::{Plugin, PluginError, PluginInfo, split_subcommand};

const DEFAULT_API_URL: &str = "https://api.github.com";
const PULLS_PER_PAGE: u8 = 10;
const USAGE: &str = "csync plugin exec github summary <owner/repo> [email]";

#[derive(Debug, Clone)]
struct GitHubSettings {
    api_url: String,
    token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SummaryRequest {
    owner: String,
    repo: String,
    email: Option<String>,
}

fn parse_args(args: &[String]) -> Result<SummaryRequest, PluginError> {
    let (command, rest) = split_subcommand(args, USAGE)?;
    if command != "summary" {
        return Err(PluginError::Usage(format!(
            "unknown command for github: {command}"
        )));
    }

    let Some(full_name) = rest.first() else {
        return Err(PluginError::Usage(format!("usage: {USAGE}")));
    };
    let (owner, repo) = parse_owner_repo(full_name)?;

    Ok(SummaryRequest {
        owner: owner.to_string(),
        repo: repo.to_string(),
        email: rest.get(1).cloned(),
    })
}

fn parse_owner_repo(full_name: &str) -> Result<(&str, &str), PluginError> {
    match full_name.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => Ok((*owner, *repo)),
        _ => Err(PluginError::Usage(format!(
            "invalid repository '{full_name}', expected owner/repo"
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PullRequest {
    number: u64,
    title: String,
    state: String,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Commit {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
struct CommitAuthor {
    email: Option<String>,
}

impl Commit {
    fn author_email(&self) -> Option<&str> {
        self.commit.author.as_ref()?.email.as_deref()
    }

    fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

fn filter_commits_by_email(commits: Vec<Commit>, email: &str) -> Vec<Commit> {
    commits
        .into_iter()
        .filter(|c| c.author_email() == Some(email))
        .collect()
}

fn format_pull_request(pr: &PullRequest, commits: &[Commit]) -> String {
    let mut lines = vec![
        format!("PR #{}: {} ({})", pr.number, pr.title, pr.state),
        format!("   Status: {}", pr.state),
        format!("   Merged: {}", pr.merged_at.is_some()),
        format!("   Created: {}", pr.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
        "   Commits:".to_string(),
    ];
    lines.extend(
        commits
            .iter()
            .map(|c| format!("      - [{}] {}", c.short_sha(), c.commit.message)),
    );
    lines.join("\n")
}

/// GitHub pull request summary plugin
///
/// Requires `GITHUB_TOKEN`; `GITHUB_API_URL` points it at an enterprise
/// instance.
#[derive(Debug)]
pub struct GitHubPlugin {
    env: Env,
    client: reqwest::Client,
    settings: OnceLock<GitHubSettings>,
}

impl Default for GitHubPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubPlugin {
    /// Create a plugin reading its token from the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_env(Env::process())
    }

    /// Create a plugin reading its token from `env`
    #[must_use]
    pub fn with_env(env: Env) -> Self {
        Self {
            env,
            client: http_client(),
            settings: OnceLock::new(),
        }
    }

    fn settings(&self) -> Result<&GitHubSettings, PluginError> {
        self.settings
            .get()
            .ok_or_else(|| PluginError::Other("github plugin is not initialized".to_string()))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        settings: &GitHubSettings,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, PluginError> {
        let response = self
            .client
            .get(format!("{}{path}", settings.api_url))
            .bearer_auth(&settings.token)
            .header("Accept", "application/vnd.github+json")
            .query(query)
            .send()
            .await?;

        let response = expect_status("GitHub", response, &[StatusCode::OK]).await?;
        decode(response).await
    }

    async fn summary(
        &self,
        settings: &GitHubSettings,
        request: &SummaryRequest,
    ) -> Result<(), PluginError> {
        let SummaryRequest { owner, repo, email } = request;

        let pulls: Vec<PullRequest> = self
            .get(
                settings,
                &format!("/repos/{owner}/{repo}/pulls"),
                &[
                    ("state", "all".to_string()),
                    ("per_page", PULLS_PER_PAGE.to_string()),
                ],
            )
            .await?;
        tracing::debug!(repo = %format!("{owner}/{repo}"), count = pulls.len(), "fetched pull requests");

        match email {
            Some(email) => {
                println!("Pull Request Summary for {owner}/{repo} (commits by {email})");
            }
            None => println!("Pull Request Summary for {owner}/{repo}"),
        }

        let mut shown = 0usize;
        for pr in &pulls {
            let path = format!("/repos/{owner}/{repo}/pulls/{}/commits", pr.number);
            let commits: Vec<Commit> = match self.get(settings, &path, &[]).await {
                Ok(commits) => commits,
                Err(e) => {
                    tracing::warn!(pr = pr.number, error = %e, "failed to fetch commits");
                    println!("   Error fetching commits for PR #{}: {e}", pr.number);
                    continue;
                }
            };

            let commits = match email {
                Some(email) => filter_commits_by_email(commits, email),
                None => commits,
            };
            if email.is_some() && commits.is_empty() {
                continue;
            }

            shown += 1;
            println!("\n{}", format_pull_request(pr, &commits));
        }

        if shown == 0 {
            println!("No pull requests found.");
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for GitHubPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("github", "GitHub Plugin: Fetch PRs and commits")
    }

    async fn init(&self) -> Result<(), PluginError> {
        let settings = GitHubSettings {
            token: self.env.require("GITHUB_TOKEN")?,
            api_url: self
                .env
                .get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };
        tracing::info!(api_url = %settings.api_url, "github plugin initialized");

        if self.settings.set(settings).is_err() {
            tracing::debug!("github plugin already initialized");
        }
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> Result<(), PluginError> {
        let request = parse_args(args)?;
        let settings = self.settings()?;
        self.summary(settings, &request).await
    }
}
