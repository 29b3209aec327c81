//! Folder encrypt/decrypt pipeline.
//!
//! Files are enumerated up front (sorted, no symlinks) and then processed one
//! by one, so writes into the output tree never feed back into the walk.
//! Each file goes through the chunked stream envelope with a fresh salt and
//! nonce; outputs mirror the input tree with [`ENCRYPTED_SUFFIX`] appended.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use cryptoguard_core::{
    FolderOptions, FolderReport, GuardError, GuardResult, IoContext, ProgressFn, ENCRYPTED_SUFFIX,
};
use cryptoguard_crypto::{decrypt_file, encrypt_file, KdfParams, StreamParams};
use secrecy::SecretString;
use tempfile::NamedTempFile;

use crate::archive::{bundle_to_file, unbundle_file};
use crate::cleanup::{remove_file_into, remove_tree_into};
use crate::walk::{collect_files, normalize_lexically};

/// Encrypt every file under `input` into `output`.
///
/// Per-file mode writes `output/<rel>.enc` for each `input/<rel>`. With
/// `bundle_first`, the whole tree is archived to a uniquely named temporary
/// in `output`, encrypted to `output/<dirname>.zip.enc`, and the plaintext
/// archive removed.
///
/// With `delete_original`, sources are removed only after their encrypted
/// counterpart was written; removal failures are collected in the report.
pub fn encrypt_folder(
    input: &Path,
    output: &Path,
    password: &SecretString,
    opts: &FolderOptions,
    params: &StreamParams,
    progress: Option<&ProgressFn>,
) -> GuardResult<FolderReport> {
    check_disjoint(input, output)?;
    std::fs::create_dir_all(output).io_context(|| format!("creating {}", output.display()))?;

    if opts.bundle_first {
        return encrypt_bundled(input, output, password, opts, params, progress);
    }

    let files = collect_files(input, opts.recursive)?;
    let total = files.len() as u64;
    tracing::info!(input = %input.display(), files = total, recursive = opts.recursive, "encrypting folder");

    let mut report = FolderReport::default();
    for (i, path) in files.iter().enumerate() {
        let rel = relative(input, path)?;
        let target = with_suffix(&output.join(rel));
        ensure_parent(&target)?;

        report.bytes += encrypt_file(path, &target, password, params)?;
        report.files += 1;
        tracing::debug!(file = %rel.display(), "encrypted");

        if opts.delete_original {
            remove_file_into(path, &mut report);
        }
        if let Some(cb) = progress {
            cb(i as u64 + 1, total, &rel.to_string_lossy());
        }
    }

    tracing::info!(files = report.files, bytes = report.bytes, "folder encrypted");
    Ok(report)
}

fn encrypt_bundled(
    input: &Path,
    output: &Path,
    password: &SecretString,
    opts: &FolderOptions,
    params: &StreamParams,
    progress: Option<&ProgressFn>,
) -> GuardResult<FolderReport> {
    let name = bundle_name(input)?;
    let encrypted = output.join(format!("{name}.zip{ENCRYPTED_SUFFIX}"));
    tracing::info!(input = %input.display(), archive = %encrypted.display(), "encrypting folder as bundle");

    let archive = temp_archive(output)?;
    let stats = bundle_to_file(input, archive.path())?;
    if let Some(cb) = progress {
        cb(1, 2, "archived");
    }

    let result = encrypt_file(archive.path(), &encrypted, password, params);
    // The plaintext archive never outlives this call
    let archive_leftover = close_temp(archive);
    result?;
    if let Some(cb) = progress {
        cb(2, 2, "encrypted");
    }

    let mut report = FolderReport {
        files: stats.files,
        bytes: stats.bytes,
        cleanup_failures: archive_leftover.into_iter().collect(),
    };
    if opts.delete_original {
        remove_tree_into(input, &mut report);
    }

    tracing::info!(files = report.files, bytes = report.bytes, "bundle encrypted");
    Ok(report)
}

/// Decrypt every `*.enc` file under `input` into `output`, stripping the
/// suffix. Other files are ignored.
///
/// Stops at the first failure; files decrypted before it stay in place. With
/// `delete_original`, encrypted sources are removed once the whole walk
/// succeeded. `bundle_first` has no meaning here and is ignored.
pub fn decrypt_folder(
    input: &Path,
    output: &Path,
    password: &SecretString,
    opts: &FolderOptions,
    kdf: &KdfParams,
    progress: Option<&ProgressFn>,
) -> GuardResult<FolderReport> {
    check_disjoint(input, output)?;
    std::fs::create_dir_all(output).io_context(|| format!("creating {}", output.display()))?;

    let files: Vec<(PathBuf, PathBuf)> = collect_files(input, opts.recursive)?
        .into_iter()
        .filter_map(|path| {
            let stripped = strip_suffix(&path)?;
            Some((path, stripped))
        })
        .collect();
    let total = files.len() as u64;
    tracing::info!(input = %input.display(), files = total, recursive = opts.recursive, "decrypting folder");

    let mut report = FolderReport::default();
    for (i, (path, stripped)) in files.iter().enumerate() {
        let rel = relative(input, stripped)?;
        let target = output.join(rel);
        ensure_parent(&target)?;

        report.bytes += decrypt_file(path, &target, password, kdf).map_err(|e| {
            tracing::error!(file = %path.display(), "decrypt failed: {e}");
            e
        })?;
        report.files += 1;
        tracing::debug!(file = %rel.display(), "decrypted");

        if let Some(cb) = progress {
            cb(i as u64 + 1, total, &rel.to_string_lossy());
        }
    }

    if opts.delete_original {
        for (path, _) in &files {
            remove_file_into(path, &mut report);
        }
    }

    tracing::info!(files = report.files, bytes = report.bytes, "folder decrypted");
    Ok(report)
}

/// Decrypt a bundled archive (`*.zip.enc`) and extract it under `output`.
///
/// The decrypted archive goes to a uniquely named temporary beside
/// `encrypted`, is unpacked, then removed whether or not extraction succeeded. With `delete_original` the
/// encrypted bundle is removed after a successful extraction.
pub fn decrypt_bundle(
    encrypted: &Path,
    output: &Path,
    password: &SecretString,
    delete_original: bool,
    kdf: &KdfParams,
) -> GuardResult<FolderReport> {
    std::fs::create_dir_all(output).io_context(|| format!("creating {}", output.display()))?;

    if encrypted.file_name().is_none() {
        return Err(GuardError::Config(format!("not a file: {}", encrypted.display())));
    }
    let dir = match encrypted.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let archive = temp_archive(dir)?;

    let result = decrypt_file(encrypted, archive.path(), password, kdf)
        .and_then(|_| unbundle_file(archive.path(), output));
    let archive_leftover = close_temp(archive);
    let stats = result?;

    let mut report = FolderReport {
        files: stats.files,
        bytes: stats.bytes,
        cleanup_failures: archive_leftover.into_iter().collect(),
    };
    if delete_original {
        remove_file_into(encrypted, &mut report);
    }

    tracing::info!(bundle = %encrypted.display(), files = report.files, "bundle extracted");
    Ok(report)
}

/// Reject an output directory that is, or lies inside, the input directory.
fn check_disjoint(input: &Path, output: &Path) -> GuardResult<()> {
    let input_abs = normalize_lexically(input)?;
    let output_abs = normalize_lexically(output)?;
    if output_abs.starts_with(&input_abs) {
        return Err(GuardError::Config(format!(
            "output directory {} must not be inside input directory {}",
            output.display(),
            input.display()
        )));
    }
    Ok(())
}

/// Reserve a fresh, uniquely named archive path inside `dir`.
fn temp_archive(dir: &Path) -> GuardResult<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".cg_archive")
        .suffix(".zip")
        .tempfile_in(dir)
        .io_context(|| format!("creating temporary archive in {}", dir.display()))
}

/// Remove a temporary archive, returning its path if it could not be removed.
fn close_temp(archive: NamedTempFile) -> Option<PathBuf> {
    let path = archive.path().to_path_buf();
    match archive.close() {
        Ok(()) => None,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to remove temporary archive: {e}");
            Some(path)
        }
    }
}

fn relative<'a>(root: &Path, path: &'a Path) -> GuardResult<&'a Path> {
    path.strip_prefix(root).map_err(|_| {
        GuardError::Format(format!("{} is not under {}", path.display(), root.display()))
    })
}

fn ensure_parent(path: &Path) -> GuardResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).io_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

/// `path` with [`ENCRYPTED_SUFFIX`] appended to its file name.
pub fn with_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

/// `path` without its [`ENCRYPTED_SUFFIX`], or `None` if it does not carry one.
///
/// Works on the OS file name, so names that are not valid UTF-8 still match.
pub fn strip_suffix(path: &Path) -> Option<PathBuf> {
    let ext = ENCRYPTED_SUFFIX.trim_start_matches('.');
    // A bare ".enc" has no extension and is left alone
    if path.extension()? != OsStr::new(ext) {
        return None;
    }
    Some(path.with_extension(""))
}

fn bundle_name(input: &Path) -> GuardResult<String> {
    let abs = normalize_lexically(input)?;
    Ok(abs
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("bundle")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("out/a/b.txt")),
            PathBuf::from("out/a/b.txt.enc")
        );
    }

    #[test]
    fn test_strip_suffix() {
        assert_eq!(
            strip_suffix(Path::new("out/a/b.txt.enc")),
            Some(PathBuf::from("out/a/b.txt"))
        );
        assert_eq!(strip_suffix(Path::new("out/notes.txt")), None);
        assert_eq!(strip_suffix(Path::new("out/.enc")), None);
        assert_eq!(strip_suffix(Path::new("out/b.encx")), None);
        assert_eq!(
            strip_suffix(Path::new("out/archive.zip.enc")),
            Some(PathBuf::from("out/archive.zip"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_strip_suffix_non_utf8() {
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("out").join(OsStr::from_bytes(b"caf\xe9.txt.enc"));
        let stripped = strip_suffix(&path).unwrap();
        assert_eq!(
            stripped,
            Path::new("out").join(OsStr::from_bytes(b"caf\xe9.txt"))
        );
    }

    #[test]
    fn test_temp_archive_is_unique_and_removed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = temp_archive(tmp.path()).unwrap();
        let b = temp_archive(tmp.path()).unwrap();
        assert_ne!(a.path(), b.path());

        let path = a.path().to_path_buf();
        assert_eq!(close_temp(a), None);
        assert!(!path.exists());
        // Already gone counts as removed
        std::fs::remove_file(b.path()).unwrap();
        assert_eq!(close_temp(b), None);
    }

    #[test]
    fn test_check_disjoint() {
        assert!(check_disjoint(Path::new("/data/in"), Path::new("/data/out")).is_ok());
        assert!(matches!(
            check_disjoint(Path::new("/data/in"), Path::new("/data/in/out")),
            Err(GuardError::Config(_))
        ));
        assert!(matches!(
            check_disjoint(Path::new("/data/in"), Path::new("/data/in")),
            Err(GuardError::Config(_))
        ));
        // Sibling sharing a name prefix is fine
        assert!(check_disjoint(Path::new("/data/in"), Path::new("/data/input")).is_ok());
    }

    #[test]
    fn test_bundle_name() {
        assert_eq!(bundle_name(Path::new("/data/photos")).unwrap(), "photos");
        assert_eq!(bundle_name(Path::new("/")).unwrap(), "bundle");
    }
}
