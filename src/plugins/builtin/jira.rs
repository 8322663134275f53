//! Jira integration: issue listings, assigned work and an AI self-review summary

use std::sync::OnceLock;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{Env, decode, expect_status, http_client};
use crate::plugins::contract::{Plugin, PluginError, PluginInfo, split_subcommand};

const SEARCH_PATH: &str = "/rest/api/2/search";
const ISSUE_PATH: &str = "/rest/api/2/issue";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const SUMMARY_MODEL: &str = "gpt-3.5-turbo";
const SUMMARY_MAX_TOKENS: u32 = 200;
const USAGE: &str =
    "csync plugin exec jira <create-issue|list-issues|assigned-issues|summary> [args...]";

#[derive(Debug, Clone)]
struct JiraSettings {
    base_url: String,
    email: String,
    api_token: String,
    openai: Option<OpenAiSettings>,
}

#[derive(Debug, Clone)]
struct OpenAiSettings {
    api_key: String,
    organization: Option<String>,
    base_url: String,
}

impl JiraSettings {
    fn from_env(env: &Env) -> Result<Self, PluginError> {
        let base_url = env.require("JIRA_BASE_URL")?;
        let email = env.require("JIRA_EMAIL")?;
        let api_token = env.require("JIRA_API_TOKEN")?;

        let openai = env.get("OPENAI_API_KEY").map(|api_key| OpenAiSettings {
            api_key,
            organization: env.get("OPENAI_ORG"),
            base_url: env
                .get("OPENAI_BASE_URL")
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        });

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            api_token,
            openai,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum JiraCommand {
    CreateIssue {
        project: String,
        summary: String,
        description: String,
    },
    ListIssues {
        project: String,
    },
    AssignedIssues {
        email: String,
    },
    Summary {
        email: String,
    },
}

impl JiraCommand {
    fn parse(args: &[String]) -> Result<Self, PluginError> {
        let (command, rest) = split_subcommand(args, USAGE)?;
        let usage = |text: &str| PluginError::Usage(format!("usage: {command} {text}"));

        match command {
            "create-issue" => match rest {
                [project, summary, description, ..] => Ok(Self::CreateIssue {
                    project: project.clone(),
                    summary: summary.clone(),
                    description: description.clone(),
                }),
                _ => Err(usage("<projectKey> <summary> <description>")),
            },
            "list-issues" => match rest {
                [project, ..] => Ok(Self::ListIssues {
                    project: project.clone(),
                }),
                _ => Err(usage("<projectKey>")),
            },
            "assigned-issues" => match rest {
                [email, ..] => Ok(Self::AssignedIssues {
                    email: email.clone(),
                }),
                _ => Err(usage("<userEmail>")),
            },
            "summary" => match rest {
                [email, ..] => Ok(Self::Summary {
                    email: email.clone(),
                }),
                _ => Err(usage("<userEmail>")),
            },
            other => Err(PluginError::Usage(format!("unknown Jira command: {other}"))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Clone, Deserialize)]
struct Issue {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    issuetype: Option<NamedField>,
    #[serde(default)]
    status: Option<NamedField>,
    #[serde(default)]
    updated: String,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedField {
    name: String,
}

impl Issue {
    fn issue_type(&self) -> &str {
        self.fields.issuetype.as_ref().map_or("", |t| t.name.as_str())
    }

    fn status(&self) -> &str {
        self.fields.status.as_ref().map_or("", |s| s.name.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Jira issue tracker plugin
///
/// Requires `JIRA_BASE_URL`, `JIRA_EMAIL` and `JIRA_API_TOKEN`. The `summary`
/// command additionally needs `OPENAI_API_KEY`.
#[derive(Debug)]
pub struct JiraPlugin {
    env: Env,
    client: reqwest::Client,
    settings: OnceLock<JiraSettings>,
}

impl Default for JiraPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl JiraPlugin {
    /// Create a plugin reading credentials from the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_env(Env::process())
    }

    /// Create a plugin reading credentials from `env`
    #[must_use]
    pub fn with_env(env: Env) -> Self {
        Self {
            env,
            client: http_client(),
            settings: OnceLock::new(),
        }
    }

    fn settings(&self) -> Result<&JiraSettings, PluginError> {
        self.settings
            .get()
            .ok_or_else(|| PluginError::Other("jira plugin is not initialized".to_string()))
    }

    async fn search(&self, settings: &JiraSettings, jql: &str) -> Result<Vec<Issue>, PluginError> {
        let response = self
            .client
            .get(format!("{}{SEARCH_PATH}", settings.base_url))
            .basic_auth(&settings.email, Some(&settings.api_token))
            .query(&[("jql", jql)])
            .send()
            .await?;

        let response = expect_status("Jira", response, &[StatusCode::OK]).await?;
        let body: SearchResponse = decode(response).await?;
        Ok(body.issues)
    }

    async fn create_issue(
        &self,
        settings: &JiraSettings,
        project: &str,
        summary: &str,
        description: &str,
    ) -> Result<(), PluginError> {
        let payload = json!({
            "fields": {
                "project": { "key": project },
                "summary": summary,
                "description": description,
                "issuetype": { "name": "Task" },
            }
        });

        let response = self
            .client
            .post(format!("{}{ISSUE_PATH}", settings.base_url))
            .basic_auth(&settings.email, Some(&settings.api_token))
            .json(&payload)
            .send()
            .await?;

        let response = expect_status("Jira", response, &[StatusCode::CREATED]).await?;
        let created: Option<CreatedIssue> = response.json().await.ok();

        match created.and_then(|c| c.key) {
            Some(key) => println!("Created Jira issue {key} in {project}"),
            None => println!("Created Jira issue in {project}"),
        }
        Ok(())
    }

    async fn summarize(&self, settings: &JiraSettings, email: &str) -> Result<(), PluginError> {
        let openai = settings
            .openai
            .as_ref()
            .ok_or_else(|| PluginError::MissingCredential("OPENAI_API_KEY".to_string()))?;

        let issues = self.search(settings, &assigned_jql(email)).await?;
        if issues.is_empty() {
            println!("No issues assigned to {email}; nothing to summarize.");
            return Ok(());
        }

        let payload = json!({
            "model": SUMMARY_MODEL,
            "messages": [
                { "role": "system", "content": "You are an assistant summarizing Jira issue contributions." },
                { "role": "user", "content": summary_prompt(&issues) },
            ],
            "max_tokens": SUMMARY_MAX_TOKENS,
        });

        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", openai.base_url))
            .bearer_auth(&openai.api_key)
            .json(&payload);
        if let Some(org) = &openai.organization {
            request = request.header("OpenAI-Organization", org);
        }

        let response = expect_status("OpenAI", request.send().await?, &[StatusCode::OK]).await?;
        let completion: ChatCompletion = decode(response).await?;

        match completion.choices.into_iter().next() {
            Some(choice) => println!("AI-Generated Summary:\n{}", choice.message.content.trim()),
            None => println!("AI did not return a summary."),
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for JiraPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("jira", "Integration with Jira for tracking issues")
    }

    async fn init(&self) -> Result<(), PluginError> {
        let settings = JiraSettings::from_env(&self.env)?;
        tracing::info!(
            base_url = %settings.base_url,
            ai_summary = settings.openai.is_some(),
            "jira plugin initialized"
        );

        if self.settings.set(settings).is_err() {
            tracing::debug!("jira plugin already initialized");
        }
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> Result<(), PluginError> {
        let command = JiraCommand::parse(args)?;
        let settings = self.settings()?;

        match command {
            JiraCommand::CreateIssue {
                project,
                summary,
                description,
            } => {
                self.create_issue(settings, &project, &summary, &description)
                    .await
            }
            JiraCommand::ListIssues { project } => {
                let issues = self.search(settings, &project_jql(&project)).await?;
                tracing::info!(project = %project, count = issues.len(), "fetched Jira issues");
                println!("{}", format_project_issues(&project, &issues));
                Ok(())
            }
            JiraCommand::AssignedIssues { email } => {
                let issues = self.search(settings, &assigned_jql(&email)).await?;
                println!("{}", format_assigned_issues(&email, &issues));
                Ok(())
            }
            JiraCommand::Summary { email } => self.summarize(settings, &email).await,
        }
    }
}

fn project_jql(project: &str) -> String {
    format!("project=\"{project}\"")
}

fn assigned_jql(email: &str) -> String {
    format!("assignee='{email}' ORDER BY updated DESC")
}

fn format_project_issues(project: &str, issues: &[Issue]) -> String {
    if issues.is_empty() {
        return format!("No issues found for project {project}.");
    }

    let lines: Vec<String> = issues
        .iter()
        .map(|issue| format!("   - [{}] {}", issue.key, issue.fields.summary))
        .collect();
    format!("Issues for project {project}:\n{}", lines.join("\n"))
}

fn format_assigned_issues(email: &str, issues: &[Issue]) -> String {
    if issues.is_empty() {
        return format!("No issues assigned to {email}.");
    }

    let lines: Vec<String> = issues
        .iter()
        .map(|issue| {
            format!(
                "   - [{}] ({}) {}\n     Status: {} | Updated: {}",
                issue.key,
                issue.issue_type(),
                issue.fields.summary,
                issue.status(),
                issue.fields.updated
            )
        })
        .collect();
    format!("Issues assigned to {email}:\n{}", lines.join("\n"))
}

fn summary_prompt(issues: &[Issue]) -> String {
    let contributions: Vec<String> = issues
        .iter()
        .map(|issue| {
            format!(
                "- [{}] {}: {} (Status: {}, Updated: {})",
                issue.issue_type(),
                issue.key,
                issue.fields.summary,
                issue.status(),
                issue.fields.updated
            )
        })
        .collect();

    format!(
        "I am preparing a self-evaluation for my work. Summarize my Jira contributions \
         professionally and concisely, focusing on impact rather than listing tasks.\n\n\
         Here are my recent Jira contributions:\n{}\n\n\
         Respond in the first person, starting with \"I...\", as I would describe my \
         achievements in a performance review.",
        contributions.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn env_for(server_url: &str) -> Env {
        Env::from_pairs([
            ("JIRA_BASE_URL", format!("{server_url}/")),
            ("JIRA_EMAIL", "me@example.com".to_string()),
            ("JIRA_API_TOKEN", "secret".to_string()),
            ("OPENAI_API_KEY", "sk-test".to_string()),
            ("OPENAI_BASE_URL", server_url.to_string()),
        ])
    }

    fn issue(key: &str, summary: &str) -> Issue {
        Issue {
            key: key.to_string(),
            fields: IssueFields {
                summary: summary.to_string(),
                issuetype: Some(NamedField {
                    name: "Task".to_string(),
                }),
                status: Some(NamedField {
                    name: "Done".to_string(),
                }),
                updated: "2024-05-01".to_string(),
            },
        }
    }

    #[test]
    fn parse_commands() {
        assert_eq!(
            JiraCommand::parse(&args(&["list-issues", "DEMO"])).unwrap(),
            JiraCommand::ListIssues {
                project: "DEMO".to_string()
            }
        );
        assert_eq!(
            JiraCommand::parse(&args(&["create-issue", "DEMO", "Title", "Body"])).unwrap(),
            JiraCommand::CreateIssue {
                project: "DEMO".to_string(),
                summary: "Title".to_string(),
                description: "Body".to_string(),
            }
        );
    }

    #[test]
    fn parse_rejects_bad_arity_and_unknown_commands() {
        let err = JiraCommand::parse(&args(&["create-issue", "DEMO"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "usage: create-issue <projectKey> <summary> <description>"
        );

        let err = JiraCommand::parse(&args(&["summary"])).unwrap_err();
        assert!(matches!(err, PluginError::Usage(_)));

        let err = JiraCommand::parse(&args(&["delete", "DEMO-1"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown Jira command: delete");

        assert!(matches!(
            JiraCommand::parse(&[]),
            Err(PluginError::Usage(_))
        ));
    }

    #[test]
    fn formats_issue_listings() {
        let issues = vec![issue("DEMO-1", "Fix login"), issue("DEMO-2", "Add docs")];
        assert_eq!(
            format_project_issues("DEMO", &issues),
            "Issues for project DEMO:\n   - [DEMO-1] Fix login\n   - [DEMO-2] Add docs"
        );
        assert_eq!(
            format_assigned_issues("me@example.com", &issues[..1]),
            "Issues assigned to me@example.com:\n   - [DEMO-1] (Task) Fix login\n     Status: Done | Updated: 2024-05-01"
        );
        assert_eq!(
            format_assigned_issues("nobody@example.com", &[]),
            "No issues assigned to nobody@example.com."
        );
    }

    #[test]
    fn prompt_lists_contributions() {
        let prompt = summary_prompt(&[issue("DEMO-1", "Fix login")]);
        assert!(prompt.contains("- [Task] DEMO-1: Fix login (Status: Done, Updated: 2024-05-01)"));
    }

    #[tokio::test]
    async fn init_requires_credentials() {
        let plugin = JiraPlugin::with_env(Env::from_pairs([("JIRA_BASE_URL", "https://x")]));
        let err = plugin.init().await.unwrap_err();
        assert!(matches!(err, PluginError::MissingCredential(ref k) if k == "JIRA_EMAIL"));
    }

    #[tokio::test]
    async fn list_issues_queries_project() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::UrlEncoded(
                "jql".to_string(),
                "project=\"DEMO\"".to_string(),
            ))
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"issues":[{"key":"DEMO-1","fields":{"summary":"Fix login"}}]}"#)
            .create_async()
            .await;

        let plugin = JiraPlugin::with_env(env_for(&server.url()));
        plugin.init().await.unwrap();
        plugin.execute(&args(&["list-issues", "DEMO"])).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"errorMessages":["The value 'nobody@example.com' does not exist for the field 'assignee'."]}"#)
            .create_async()
            .await;

        let plugin = JiraPlugin::with_env(env_for(&server.url()));
        plugin.init().await.unwrap();
        let err = plugin
            .execute(&args(&["assigned-issues", "nobody@example.com"]))
            .await
            .unwrap_err();

        let PluginError::Api { service, status, body } = err else {
            panic!("expected api error");
        };
        assert_eq!(service, "Jira");
        assert!(status.starts_with("400"));
        assert!(body.contains("nobody@example.com"));
    }

    #[tokio::test]
    async fn create_issue_expects_created() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ISSUE_PATH)
            .match_body(Matcher::PartialJson(json!({
                "fields": { "project": { "key": "DEMO" }, "summary": "Title" }
            })))
            .with_status(201)
            .with_body(r#"{"id":"10001","key":"DEMO-7"}"#)
            .create_async()
            .await;

        let plugin = JiraPlugin::with_env(env_for(&server.url()));
        plugin.init().await.unwrap();
        plugin
            .execute(&args(&["create-issue", "DEMO", "Title", "Body"]))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn summary_asks_openai() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"issues":[{"key":"DEMO-1","fields":{"summary":"Fix login","issuetype":{"name":"Bug"},"status":{"name":"Done"},"updated":"2024-05-01"}}]}"#)
            .create_async()
            .await;
        let completion = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"I fixed login."}}]}"#)
            .create_async()
            .await;

        let plugin = JiraPlugin::with_env(env_for(&server.url()));
        plugin.init().await.unwrap();
        plugin
            .execute(&args(&["summary", "me@example.com"]))
            .await
            .unwrap();

        completion.assert_async().await;
    }

    #[tokio::test]
    async fn summary_without_openai_key() {
        let plugin = JiraPlugin::with_env(Env::from_pairs([
            ("JIRA_BASE_URL", "https://jira.example.com"),
            ("JIRA_EMAIL", "me@example.com"),
            ("JIRA_API_TOKEN", "secret"),
        ]));
        plugin.init().await.unwrap();

        let err = plugin
            .execute(&args(&["summary", "me@example.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::MissingCredential(ref k) if k == "OPENAI_API_KEY"));
    }
}
