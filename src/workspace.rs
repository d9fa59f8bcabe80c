//! C3 — temp workspace allocation with guaranteed, best-effort cleanup (§4.3).

use std::path::{Path, PathBuf};

use crate::error::GradingError;

/// Writes `content` to a freshly created temp file with the given extension and returns
/// its path. The caller owns the file exclusively until it calls `cleanup`.
pub fn create_file(content: &str, extension: &str) -> Result<PathBuf, GradingError> {
    let file_name = format!("contestify-{}.{}", uuid::Uuid::new_v4(), extension);
    let path = std::env::temp_dir().join(file_name);
    std::fs::write(&path, content)
        .map_err(|e| GradingError::TempWorkspace(format!("failed to write {:?}: {}", path, e)))?;
    Ok(path)
}

/// Creates a fresh, empty temp directory and returns its path.
pub fn create_dir() -> Result<PathBuf, GradingError> {
    let dir_name = format!("contestify-dir-{}", uuid::Uuid::new_v4());
    let path = std::env::temp_dir().join(dir_name);
    std::fs::create_dir_all(&path)
        .map_err(|e| GradingError::TempWorkspace(format!("failed to create {:?}: {}", path, e)))?;
    Ok(path)
}

/// Best-effort, idempotent removal of a workspace file or directory. Failures are logged,
/// never propagated — cleanup must never be the reason a grading call fails.
pub fn cleanup(path: &Path) {
    if !path.exists() {
        return;
    }
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    if let Err(e) = result {
        log::warn!("failed to clean up workspace path {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_file_writes_content() {
        let path = create_file("print(1)", "py").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print(1)");
        cleanup(&path);
        assert!(!path.exists());
    }

    #[test]
    fn create_dir_makes_empty_directory() {
        let dir = create_dir().unwrap();
        assert!(dir.is_dir());
        cleanup(&dir);
        assert!(!dir.exists());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let path = create_file("x", "py").unwrap();
        cleanup(&path);
        cleanup(&path); // must not panic on a missing path
    }
}
