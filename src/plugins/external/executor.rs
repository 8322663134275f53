//! Plugin process execution

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::protocol::Request;

/// How to start a plugin artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    /// Program to spawn
    pub program: String,
    /// Arguments before any request data
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: PathBuf,
}

/// Determine how to run an artifact based on its extension
///
/// # Errors
///
/// Returns error for extensions with no known interpreter
pub fn launcher_for(artifact: &Path) -> Result<Launcher, String> {
    let extension = artifact
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let path_str = artifact
        .to_str()
        .ok_or("artifact path is not valid UTF-8")?
        .to_string();

    let (program, args) = match extension {
        "py" => ("python3".to_string(), vec![path_str]),
        "js" => ("node".to_string(), vec![path_str]),
        "ts" => ("bun".to_string(), vec!["run".to_string(), path_str]),
        "rb" => ("ruby".to_string(), vec![path_str]),
        "sh" => ("sh".to_string(), vec![path_str]),
        // No extension: executable binary or script with shebang
        "" => (path_str, vec![]),
        _ => return Err(format!("unknown plugin extension: .{extension}")),
    };

    let working_dir = artifact
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    Ok(Launcher {
        program,
        args,
        working_dir,
    })
}

/// Run one request against a plugin process and return its stdout
///
/// The request is written as a single JSON line and stdin is closed. A
/// `limit` of `None` waits for the process however long it takes.
///
/// # Errors
///
/// Returns error if the process cannot be spawned, times out or exits
/// unsuccessfully
pub async fn exchange(
    launcher: &Launcher,
    request: &Request,
    limit: Option<Duration>,
) -> Result<String, String> {
    let mut line =
        serde_json::to_string(request).map_err(|e| format!("failed to serialize request: {e}"))?;
    line.push('\n');

    let mut child = Command::new(&launcher.program)
        .args(&launcher.args)
        .current_dir(&launcher.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn {}: {e}", launcher.program))?;

    if let Some(mut stdin) = child.stdin.take() {
        // A plugin that exits without reading its request is judged by its output
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(format!("failed to write to plugin stdin: {e}"));
            }
        }
    }

    let waited = match limit {
        Some(duration) => timeout(duration, child.wait_with_output())
            .await
            .map_err(|_| format!("plugin timed out after {duration:?}"))?,
        None => child.wait_with_output().await,
    };
    let output = waited.map_err(|e| format!("plugin execution failed: {e}"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        tracing::debug!(program = %launcher.program, stderr = %stderr.trim(), "plugin stderr");
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let detail = stderr.trim();
        return Err(if detail.is_empty() {
            format!("plugin exited with code {code}")
        } else {
            format!("plugin exited with code {code}: {detail}")
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_for_python() {
        let launcher = launcher_for(Path::new("/plugins/weather.py")).unwrap();
        assert_eq!(launcher.program, "python3");
        assert_eq!(launcher.args, vec!["/plugins/weather.py"]);
        assert_eq!(launcher.working_dir, PathBuf::from("/plugins"));
    }

    #[test]
    fn launcher_for_binary() {
        let launcher = launcher_for(Path::new("/plugins/demo")).unwrap();
        assert_eq!(launcher.program, "/plugins/demo");
        assert!(launcher.args.is_empty());
    }

    #[test]
    fn launcher_for_typescript() {
        let launcher = launcher_for(Path::new("/plugins/demo.ts")).unwrap();
        assert_eq!(launcher.program, "bun");
        assert_eq!(launcher.args, vec!["run", "/plugins/demo.ts"]);
    }

    #[test]
    fn launcher_for_bare_file_name() {
        let launcher = launcher_for(Path::new("demo.sh")).unwrap();
        assert_eq!(launcher.working_dir, PathBuf::from("."));
    }

    #[test]
    fn unknown_extension() {
        let err = launcher_for(Path::new("/plugins/demo.so")).unwrap_err();
        assert_eq!(err, "unknown plugin extension: .so");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exchange_reads_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("echo.sh");
        std::fs::write(&script, "read -r request\necho \"$request\"\n").unwrap();

        let launcher = launcher_for(&script).unwrap();
        let stdout = exchange(&launcher, &Request::Init, None).await.unwrap();
        assert_eq!(stdout.trim(), r#"{"method":"init"}"#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exchange_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "read -r request\necho boom >&2\nexit 3\n").unwrap();

        let launcher = launcher_for(&script).unwrap();
        let err = exchange(&launcher, &Request::Init, None).await.unwrap_err();
        assert_eq!(err, "plugin exited with code 3: boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exchange_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow.sh");
        std::fs::write(&script, "sleep 5\n").unwrap();

        let launcher = launcher_for(&script).unwrap();
        let err = exchange(
            &launcher,
            &Request::Describe,
            Some(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
        assert!(err.starts_with("plugin timed out"));
    }
}
