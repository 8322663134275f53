//! Plugin discovery - scan search directories for plugin artifacts

use std::path::{Path, PathBuf};

use super::external::executor::launcher_for;

/// Scan plugin directories for artifacts
///
/// Looks at the immediate files of each directory. A file qualifies when its
/// extension has a known launcher, or when it has no extension and is
/// executable. Hidden files are skipped. Results are sorted per directory so
/// load order is stable.
#[must_use]
pub fn discover_artifacts(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut results = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            tracing::debug!(path = %dir.display(), "plugin directory does not exist, skipping");
            continue;
        }

        let Ok(entries) = std::fs::read_dir(dir) else {
            tracing::warn!(path = %dir.display(), "failed to read plugin directory");
            continue;
        };

        let mut found: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_artifact(path))
            .collect();
        found.sort();

        for path in &found {
            tracing::debug!(path = %path.display(), "discovered plugin artifact");
        }
        results.extend(found);
    }

    results
}

fn is_artifact(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    if hidden {
        return false;
    }

    if path.extension().is_none() {
        return is_executable(path);
    }

    launcher_for(path).is_ok()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_artifacts(&[dir.path().to_path_buf()]).is_empty());
    }

    #[test]
    fn discover_scripts_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta.py"), "").unwrap();
        std::fs::write(dir.path().join("alpha.sh"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join(".hidden.sh"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.sh")).unwrap();

        let found = discover_artifacts(&[dir.path().to_path_buf()]);
        assert_eq!(
            found,
            vec![dir.path().join("alpha.sh"), dir.path().join("zeta.py")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn extensionless_needs_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("README");
        let binary = dir.path().join("demo");
        std::fs::write(&plain, "").unwrap();
        std::fs::write(&binary, "").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(discover_artifacts(&[dir.path().to_path_buf()]), vec![binary]);
    }

    #[test]
    fn skip_nonexistent_dir() {
        assert!(discover_artifacts(&[PathBuf::from("/nonexistent/path")]).is_empty());
    }
}
