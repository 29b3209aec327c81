//! Chunked AES-256-GCM stream envelope for files
//!
//! Stream format (binary):
//! ```text
//! [16 bytes: PBKDF2 salt][12 bytes: base nonce]
//! record*  where record = [4 bytes: sealed length, u32 BE][sealed chunk]
//! sealed chunk = [ciphertext][16 bytes: GCM tag]
//!
//! nonce(i) = base nonce with bytes 4..12 XORed by i (u64 BE)
//! AAD(i)   = i (8 bytes, BE) || last (1 byte: 0x01 on the final record, else 0x00)
//! ```
//!
//! The AAD binds each record to its position and marks the end of the stream,
//! so reordering, truncation at a record boundary, and trailing data all fail
//! authentication. An empty input still produces one (empty) final record.
//!
//! Memory use is bounded by one chunk regardless of input size.

use std::io::{self, Read, Write};

use aes_gcm::{
    aead::{Aead, Payload},
    Nonce,
};
use cryptoguard_core::{GuardError, GuardResult, IoContext};
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::envelope::{cipher_for, Header};
use crate::kdf::{derive_key, KdfParams};
use crate::{HEADER_SIZE, NONCE_SIZE, TAG_SIZE};

/// Default plaintext bytes per record (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest plaintext chunk accepted on either side (16 MiB)
pub const MAX_CHUNK_SIZE: usize = cryptoguard_core::MAX_CHUNK_SIZE;

const LEN_SIZE: usize = 4;

/// Parameters for stream encryption.
///
/// `chunk_size` only affects encryption; decryption reads record lengths from
/// the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub kdf: KdfParams,
    pub chunk_size: usize,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Encrypt everything from `reader` into `writer`.
///
/// Returns the number of plaintext bytes consumed.
pub fn encrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    password: &SecretString,
    params: &StreamParams,
) -> GuardResult<u64> {
    if params.chunk_size == 0 || params.chunk_size > MAX_CHUNK_SIZE {
        return Err(GuardError::Config(format!(
            "chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {}",
            params.chunk_size
        )));
    }

    let header = Header::random();
    let key = derive_key(password, &header.salt, &params.kdf)?;
    let cipher = cipher_for(&key);

    writer
        .write_all(&header.to_bytes())
        .io_context(|| "writing stream header")?;

    let mut current = Zeroizing::new(vec![0u8; params.chunk_size]);
    let mut next = Zeroizing::new(vec![0u8; params.chunk_size]);
    let mut current_len =
        read_full(&mut reader, &mut current).io_context(|| "reading plaintext")?;
    let mut total = 0u64;
    let mut index = 0u64;

    loop {
        // Read ahead one chunk to learn whether `current` is the final record
        let next_len = if current_len < params.chunk_size {
            0
        } else {
            read_full(&mut reader, &mut next).io_context(|| "reading plaintext")?
        };
        let last = next_len == 0;

        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&chunk_nonce(&header.nonce, index)),
                Payload {
                    msg: &current[..current_len],
                    aad: &build_aad(index, last),
                },
            )
            .map_err(|_| GuardError::format("chunk encryption failed"))?;

        let sealed_len = u32::try_from(sealed.len())
            .map_err(|_| GuardError::format("sealed chunk exceeds u32 length"))?;
        writer
            .write_all(&sealed_len.to_be_bytes())
            .and_then(|_| writer.write_all(&sealed))
            .io_context(|| format!("writing record {index}"))?;

        total += current_len as u64;
        if last {
            break;
        }
        std::mem::swap(&mut current, &mut next);
        current_len = next_len;
        index += 1;
    }

    writer.flush().io_context(|| "flushing encrypted stream")?;
    tracing::debug!(bytes = total, records = index + 1, "stream encrypted");
    Ok(total)
}

/// Decrypt a stream produced by [`encrypt_stream`] into `writer`.
///
/// Each record is authenticated before its plaintext is written, but records
/// are written as they verify: when this returns an error the writer may hold
/// a verified prefix of the plaintext and must be discarded. Use
/// [`crate::file::decrypt_file`] for an all-or-nothing file result.
///
/// Returns the number of plaintext bytes written.
pub fn decrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    password: &SecretString,
    kdf: &KdfParams,
) -> GuardResult<u64> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    let n = read_full(&mut reader, &mut header_bytes).io_context(|| "reading stream header")?;
    if n < HEADER_SIZE {
        return Err(GuardError::Format(format!(
            "encrypted stream too short: {n} bytes (minimum {HEADER_SIZE})"
        )));
    }
    let header = Header::from_bytes(&header_bytes);
    let key = derive_key(password, &header.salt, kdf)?;
    let cipher = cipher_for(&key);

    let mut len_buf = [0u8; LEN_SIZE];
    let mut n = read_full(&mut reader, &mut len_buf).io_context(|| "reading record length")?;
    if n == 0 {
        return Err(GuardError::format("encrypted stream has no records"));
    }

    let mut sealed = Vec::new();
    let mut total = 0u64;
    let mut index = 0u64;

    loop {
        if n < LEN_SIZE {
            return Err(GuardError::Format(format!(
                "record {index}: truncated length prefix"
            )));
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if !(TAG_SIZE..=MAX_CHUNK_SIZE + TAG_SIZE).contains(&len) {
            return Err(GuardError::Format(format!(
                "record {index}: invalid sealed length {len}"
            )));
        }

        sealed.resize(len, 0);
        let got = read_full(&mut reader, &mut sealed)
            .io_context(|| format!("reading record {index}"))?;
        if got < len {
            return Err(GuardError::Format(format!(
                "record {index}: truncated ({got} of {len} bytes)"
            )));
        }

        // A record is final exactly when nothing follows it
        n = read_full(&mut reader, &mut len_buf).io_context(|| "reading record length")?;
        let last = n == 0;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&chunk_nonce(&header.nonce, index)),
                    Payload {
                        msg: &sealed,
                        aad: &build_aad(index, last),
                    },
                )
                .map_err(|_| GuardError::Authentication)?,
        );

        writer
            .write_all(&plaintext)
            .io_context(|| format!("writing record {index} plaintext"))?;
        total += plaintext.len() as u64;

        if last {
            break;
        }
        index += 1;
    }

    writer.flush().io_context(|| "flushing decrypted stream")?;
    tracing::debug!(bytes = total, records = index + 1, "stream decrypted");
    Ok(total)
}

/// Per-record nonce: the base nonce with its trailing 8 bytes XORed by the record index.
fn chunk_nonce(base: &[u8; NONCE_SIZE], index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = *base;
    for (b, i) in nonce[NONCE_SIZE - 8..].iter_mut().zip(index.to_be_bytes()) {
        *b ^= i;
    }
    nonce
}

/// Build AAD: index (8 bytes BE) || last flag (1 byte)
fn build_aad(index: u64, last: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = u8::from(last);
    aad
}

/// Fill `buf` as far as the reader allows; a short count means EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
