//! Best-effort removal of sources once their encrypted or decrypted
//! counterpart is safely on disk. Failures are logged and recorded, never
//! propagated.

use std::path::Path;

use cryptoguard_core::FolderReport;

/// Remove a single file. Returns `false` (after a warning) on failure.
pub fn remove_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed source file");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to remove file: {e}");
            false
        }
    }
}

/// Remove a directory tree. Returns `false` (after a warning) on failure.
pub fn remove_tree(path: &Path) -> bool {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed source tree");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to remove directory: {e}");
            false
        }
    }
}

/// [`remove_file`], recording a failure in `report`.
pub fn remove_file_into(path: &Path, report: &mut FolderReport) {
    if !remove_file(path) {
        report.cleanup_failures.push(path.to_path_buf());
    }
}

/// [`remove_tree`], recording a failure in `report`.
pub fn remove_tree_into(path: &Path, report: &mut FolderReport) {
    if !remove_tree(path) {
        report.cleanup_failures.push(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        std::fs::write(&path, b"x").unwrap();
        assert!(remove_file(&path));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_recorded_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut report = FolderReport::default();
        remove_file_into(&tmp.path().join("gone"), &mut report);
        assert_eq!(report.cleanup_failures, vec![tmp.path().join("gone")]);
    }

    #[test]
    fn test_remove_tree() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("d");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/f"), b"x").unwrap();

        let mut report = FolderReport::default();
        remove_tree_into(&dir, &mut report);
        assert!(!dir.exists());
        assert!(report.cleanup_failures.is_empty());
    }
}
