use std::path::PathBuf;

use crate::config::FolderConfig;

/// Progress callback type (items_done, items_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Options for a single folder encrypt/decrypt run.
///
/// Built once by the caller and passed by reference; nothing in the pipeline
/// reads process-wide state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderOptions {
    /// Descend into subdirectories instead of only the top level
    pub recursive: bool,
    /// Remove sources after a successful run (best-effort)
    pub delete_original: bool,
    /// Archive the whole tree and encrypt it as one unit
    pub bundle_first: bool,
}

impl From<&FolderConfig> for FolderOptions {
    fn from(cfg: &FolderConfig) -> Self {
        Self {
            recursive: cfg.recursive,
            delete_original: cfg.delete_original,
            bundle_first: cfg.bundle_first,
        }
    }
}

/// Summary of a folder run
#[derive(Debug, Default)]
pub struct FolderReport {
    /// Files written to the output tree
    pub files: usize,
    /// Plaintext bytes processed
    pub bytes: u64,
    /// Paths whose best-effort cleanup failed
    pub cleanup_failures: Vec<PathBuf>,
}
