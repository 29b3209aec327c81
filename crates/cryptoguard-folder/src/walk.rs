//! File enumeration for the folder pipeline and the archive bundler.

use std::path::{Component, Path, PathBuf};

use cryptoguard_core::{GuardError, GuardResult, IoContext};

/// Collect regular files under `root`, sorted for a deterministic order.
///
/// With `recursive == false` only files directly inside `root` are returned.
/// Symlinks are neither followed nor returned.
pub fn collect_files(root: &Path, recursive: bool) -> GuardResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files_inner(root, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files_inner(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> GuardResult<()> {
    for entry in std::fs::read_dir(dir).io_context(|| format!("reading dir: {}", dir.display()))? {
        let entry = entry.io_context(|| format!("reading dir entry in {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .io_context(|| format!("stat {}", path.display()))?;

        if file_type.is_dir() {
            if recursive {
                collect_files_inner(&path, recursive, out)?;
            }
        } else if file_type.is_file() {
            out.push(path);
        } else {
            tracing::debug!(path = %path.display(), "skipping non-regular file");
        }
    }
    Ok(())
}

/// Path of `path` relative to `root` with `/` separators, as stored in archives.
pub fn relative_slash_path(root: &Path, path: &Path) -> GuardResult<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        GuardError::Format(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                GuardError::Format(format!("non UTF-8 file name: {}", path.display()))
            })?),
            Component::CurDir => {}
            _ => {
                return Err(GuardError::Format(format!(
                    "unexpected component in {}",
                    rel.display()
                )))
            }
        }
    }
    Ok(parts.join("/"))
}

/// Make `path` absolute and resolve `.`/`..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> GuardResult<PathBuf> {
    let abs = std::path::absolute(path).io_context(|| format!("resolving {}", path.display()))?;
    let mut out = PathBuf::new();
    for component in abs.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    Ok(out)
}
