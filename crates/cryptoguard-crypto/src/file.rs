//! Whole-file encryption on top of the chunked stream envelope.
//!
//! Output is written to a sibling temporary file and renamed into place only
//! once the stream completed; on failure the temporary file is removed, so a
//! failed decrypt never leaves unauthenticated or partial plaintext on disk.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use cryptoguard_core::{GuardResult, IoContext};
use secrecy::SecretString;

use crate::kdf::KdfParams;
use crate::stream::{decrypt_stream, encrypt_stream, StreamParams};

/// Encrypt `input` into `output`. Returns plaintext bytes read.
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    password: &SecretString,
    params: &StreamParams,
) -> GuardResult<u64> {
    let reader = open_input(input)?;
    let bytes = write_atomically(output, |writer| {
        encrypt_stream(reader, writer, password, params)
    })?;
    tracing::debug!(input = %input.display(), output = %output.display(), bytes, "file encrypted");
    Ok(bytes)
}

/// Decrypt `input` into `output`. Returns plaintext bytes written.
///
/// `output` is only created if every record authenticates.
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    password: &SecretString,
    kdf: &KdfParams,
) -> GuardResult<u64> {
    let reader = open_input(input)?;
    let bytes = write_atomically(output, |writer| {
        decrypt_stream(reader, writer, password, kdf)
    })?;
    tracing::debug!(input = %input.display(), output = %output.display(), bytes, "file decrypted");
    Ok(bytes)
}

fn open_input(path: &Path) -> GuardResult<BufReader<File>> {
    let file = File::open(path).io_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn tmp_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".cg_tmp");
    output.with_file_name(name)
}

fn write_atomically<F>(output: &Path, f: F) -> GuardResult<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> GuardResult<u64>,
{
    let tmp = tmp_path(output);
    let result = write_then_rename(&tmp, output, f);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_then_rename<F>(tmp: &Path, output: &Path, f: F) -> GuardResult<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> GuardResult<u64>,
{
    let file = File::create(tmp).io_context(|| format!("creating {}", tmp.display()))?;
    let mut writer = BufWriter::new(file);
    let bytes = f(&mut writer)?;
    let file = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .io_context(|| format!("flushing {}", tmp.display()))?;
    file.sync_all()
        .io_context(|| format!("syncing {}", tmp.display()))?;
    std::fs::rename(tmp, output).io_context(|| format!("renaming to {}", output.display()))?;
    Ok(bytes)
}
