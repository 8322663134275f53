//! Desktop notifications

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

/// Something that can show the operator a notification
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notification
    ///
    /// # Errors
    ///
    /// Returns `Notification` error if it could not be shown
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Notifier backed by the platform's notification tool
///
/// Uses `notify-send` on Linux and `osascript` on macOS.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        let (program, args) = notification_command(std::env::consts::OS, title, message)?;
        tracing::debug!(program, title, "sending desktop notification");

        let output = Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Notification(format!("failed to run {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Notification(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Command line that shows a notification on `os`
fn notification_command(
    os: &str,
    title: &str,
    message: &str,
) -> Result<(&'static str, Vec<String>)> {
    match os {
        "linux" | "freebsd" | "openbsd" | "netbsd" => Ok((
            "notify-send",
            vec![
                "--app-name=csync".to_string(),
                title.to_string(),
                message.to_string(),
            ],
        )),
        "macos" => Ok((
            "osascript",
            vec![
                "-e".to_string(),
                format!(
                    "display notification {} with title {}",
                    applescript_string(message),
                    applescript_string(title)
                ),
            ],
        )),
        other => Err(Error::Notification(format!(
            "desktop notifications are not supported on {other}"
        ))),
    }
}

/// Quote `text` as a string literal for `osascript`
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
