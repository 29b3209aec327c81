//! Zip bundling of a directory tree.
//!
//! Entries are the regular files under the root, stored with forward-slash
//! relative names in sorted order and deflate-compressed. Empty directories
//! are not recorded.
//!
//! Extraction validates every entry name before writing anything: absolute
//! names, drive prefixes and any `..` component are rejected with
//! [`GuardError::PathTraversal`], independent of what the zip crate itself
//! would sanitize.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use cryptoguard_core::{GuardError, GuardResult, IoContext};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::walk::{collect_files, relative_slash_path};

/// Counts for a bundle or unbundle run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BundleStats {
    pub files: usize,
    pub bytes: u64,
}

/// Archive every file under `root` into an in-memory zip.
pub fn bundle(root: &Path) -> GuardResult<Vec<u8>> {
    let (cursor, _) = write_bundle(root, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}

/// Archive every file under `root` into a zip at `archive_path`.
///
/// A partially written archive is removed on failure.
pub fn bundle_to_file(root: &Path, archive_path: &Path) -> GuardResult<BundleStats> {
    let file = File::create(archive_path)
        .io_context(|| format!("creating {}", archive_path.display()))?;
    match write_bundle(root, file) {
        Ok((file, stats)) => {
            file.sync_all()
                .io_context(|| format!("syncing {}", archive_path.display()))?;
            Ok(stats)
        }
        Err(e) => {
            let _ = std::fs::remove_file(archive_path);
            Err(e)
        }
    }
}

fn write_bundle<W: Write + Seek>(root: &Path, writer: W) -> GuardResult<(W, BundleStats)> {
    let files = collect_files(root, true)?;
    let mut zip = ZipWriter::new(writer);
    let mut stats = BundleStats::default();

    for path in &files {
        let name = relative_slash_path(root, path)?;
        let mut src = File::open(path).io_context(|| format!("opening {}", path.display()))?;
        let len = src
            .metadata()
            .io_context(|| format!("stat {}", path.display()))?
            .len();

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(len >= u64::from(u32::MAX));
        zip.start_file(name.as_str(), options)
            .map_err(|e| zip_error(&name, e))?;
        let copied =
            io::copy(&mut src, &mut zip).io_context(|| format!("archiving {}", path.display()))?;

        tracing::debug!(entry = %name, bytes = copied, "archived");
        stats.files += 1;
        stats.bytes += copied;
    }

    let writer = zip.finish().map_err(|e| zip_error("finishing archive", e))?;
    tracing::info!(root = %root.display(), files = stats.files, bytes = stats.bytes, "bundle complete");
    Ok((writer, stats))
}

/// Extract an in-memory zip under `dest`.
pub fn unbundle(archive: &[u8], dest: &Path) -> GuardResult<BundleStats> {
    unbundle_from(Cursor::new(archive), dest)
}

/// Extract the zip at `archive_path` under `dest`.
pub fn unbundle_file(archive_path: &Path, dest: &Path) -> GuardResult<BundleStats> {
    let file = File::open(archive_path)
        .io_context(|| format!("opening {}", archive_path.display()))?;
    unbundle_from(BufReader::new(file), dest)
}

/// Extract a zip under `dest`, creating directories as needed and
/// overwriting existing files.
///
/// All entry names are checked before the first file is written, so a
/// hostile archive leaves `dest` untouched.
pub fn unbundle_from<R: Read + Seek>(reader: R, dest: &Path) -> GuardResult<BundleStats> {
    let mut archive =
        ZipArchive::new(reader).map_err(|e| zip_error("reading archive", e))?;

    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| zip_error("reading archive entry", e))?;
        let rel = safe_entry_path(entry.name())?;
        plan.push((index, rel, entry.is_dir()));
    }

    std::fs::create_dir_all(dest).io_context(|| format!("creating {}", dest.display()))?;

    let mut stats = BundleStats::default();
    for (index, rel, is_dir) in plan {
        let target = dest.join(&rel);
        if is_dir {
            std::fs::create_dir_all(&target)
                .io_context(|| format!("creating {}", target.display()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .io_context(|| format!("creating {}", parent.display()))?;
        }

        let mut entry = archive
            .by_index(index)
            .map_err(|e| zip_error("reading archive entry", e))?;
        let mut out =
            File::create(&target).io_context(|| format!("creating {}", target.display()))?;
        let copied = io::copy(&mut entry, &mut out)
            .io_context(|| format!("extracting {}", target.display()))?;

        tracing::debug!(path = %target.display(), bytes = copied, "extracted");
        stats.files += 1;
        stats.bytes += copied;
    }

    tracing::info!(dest = %dest.display(), files = stats.files, bytes = stats.bytes, "unbundle complete");
    Ok(stats)
}

/// Turn an archive entry name into a relative path that stays under the
/// extraction root.
fn safe_entry_path(name: &str) -> GuardResult<PathBuf> {
    let traversal = || GuardError::PathTraversal(name.to_string());

    if name.starts_with('/') || name.starts_with('\\') {
        return Err(traversal());
    }

    let mut rel = PathBuf::new();
    for (i, part) in name.split(['/', '\\']).enumerate() {
        match part {
            "" | "." => {}
            ".." => return Err(traversal()),
            // `C:` style drive prefix
            _ if i == 0 && part.len() == 2 && part.ends_with(':') => return Err(traversal()),
            _ if part.contains('\0') => {
                return Err(GuardError::Format(format!("invalid entry name: {name:?}")))
            }
            _ => rel.push(part),
        }
    }

    if rel.as_os_str().is_empty() {
        return Err(GuardError::Format(format!("empty entry name: {name:?}")));
    }
    if rel.is_absolute() {
        return Err(traversal());
    }
    Ok(rel)
}

fn zip_error(context: &str, e: ZipError) -> GuardError {
    match e {
        ZipError::Io(source) => GuardError::Io {
            context: context.to_string(),
            source,
        },
        other => GuardError::Format(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn raw_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_bundle_unbundle_roundtrip() {
        let src = TempDir::new().unwrap();
        write(src.path(), "a/b.txt", b"x");
        write(src.path(), "c.txt", b"y");

        let bytes = bundle(src.path()).unwrap();
        let dst = TempDir::new().unwrap();
        let stats = unbundle(&bytes, dst.path()).unwrap();

        assert_eq!(stats, BundleStats { files: 2, bytes: 2 });
        assert_eq!(std::fs::read(dst.path().join("a/b.txt")).unwrap(), b"x");
        assert_eq!(std::fs::read(dst.path().join("c.txt")).unwrap(), b"y");
    }

    #[test]
    fn test_entries_sorted_with_forward_slashes() {
        let src = TempDir::new().unwrap();
        write(src.path(), "z.txt", b"1");
        write(src.path(), "a/inner/deep.txt", b"2");
        write(src.path(), "m.txt", b"3");

        let bytes = bundle(src.path()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a/inner/deep.txt", "m.txt", "z.txt"]);
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let bytes = raw_zip(&[("ok.txt", b"fine"), ("../../evil.txt", b"pwned")]);
        let dst = TempDir::new().unwrap();
        let out = dst.path().join("out");

        let err = unbundle(&bytes, &out).unwrap_err();
        assert!(matches!(err, GuardError::PathTraversal(ref n) if n == "../../evil.txt"));
        // Validation precedes extraction: nothing written, nothing escaped
        assert!(!out.join("ok.txt").exists());
        assert!(!dst.path().join("evil.txt").exists());
    }

    #[test]
    fn test_safe_entry_path_rules() {
        assert!(matches!(
            safe_entry_path("/etc/passwd"),
            Err(GuardError::PathTraversal(_))
        ));
        assert!(matches!(
            safe_entry_path("C:/Windows/x"),
            Err(GuardError::PathTraversal(_))
        ));
        assert!(matches!(
            safe_entry_path("a\\..\\..\\x"),
            Err(GuardError::PathTraversal(_))
        ));
        assert!(matches!(
            safe_entry_path("a/b/../c"),
            Err(GuardError::PathTraversal(_))
        ));
        assert!(matches!(safe_entry_path("./"), Err(GuardError::Format(_))));
        assert_eq!(
            safe_entry_path("./a//b.txt").unwrap(),
            PathBuf::from("a").join("b.txt")
        );
    }

    #[test]
    fn test_existing_files_overwritten() {
        let bytes = raw_zip(&[("f.txt", b"new")]);
        let dst = TempDir::new().unwrap();
        std::fs::write(dst.path().join("f.txt"), b"old contents").unwrap();

        unbundle(&bytes, dst.path()).unwrap();
        assert_eq!(std::fs::read(dst.path().join("f.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_corrupt_archive_is_format_error() {
        let dst = TempDir::new().unwrap();
        let err = unbundle(b"definitely not a zip file", dst.path()).unwrap_err();
        assert!(matches!(err, GuardError::Format(_)));
    }

    #[test]
    fn test_bundle_to_file() {
        let src = TempDir::new().unwrap();
        write(src.path(), "one.txt", b"hello");
        let out = TempDir::new().unwrap();
        let archive = out.path().join("bundle.zip");

        let stats = bundle_to_file(src.path(), &archive).unwrap();
        assert_eq!(stats.files, 1);

        let dst = TempDir::new().unwrap();
        unbundle_file(&archive, dst.path()).unwrap();
        assert_eq!(std::fs::read(dst.path().join("one.txt")).unwrap(), b"hello");
    }
}
