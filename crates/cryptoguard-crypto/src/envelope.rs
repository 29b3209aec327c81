//! Single-shot AES-256-GCM envelope
//!
//! Envelope format (binary):
//! ```text
//! [16 bytes: PBKDF2 salt][12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The text channel renders the whole envelope as standard base64.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cryptoguard_core::{GuardError, GuardResult};
use rand::RngCore;
use secrecy::SecretString;

use crate::kdf::{derive_key, DerivedKey, KdfParams};
use crate::{HEADER_SIZE, NONCE_SIZE, SALT_SIZE};

/// Parsed `salt || nonce` prefix of an envelope.
pub(crate) struct Header {
    pub salt: [u8; SALT_SIZE],
    pub nonce: [u8; NONCE_SIZE],
}

impl Header {
    /// Fresh random salt and nonce from the thread-local CSPRNG.
    pub(crate) fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);
        Self { salt, nonce }
    }

    pub(crate) fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        nonce.copy_from_slice(&bytes[SALT_SIZE..]);
        Self { salt, nonce }
    }

    pub(crate) fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..SALT_SIZE].copy_from_slice(&self.salt);
        out[SALT_SIZE..].copy_from_slice(&self.nonce);
        out
    }
}

pub(crate) fn cipher_for(key: &DerivedKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypt `plaintext` under a key derived from `password`.
///
/// Returns: `[16-byte salt][12-byte nonce][ciphertext][16-byte tag]`
pub fn seal(plaintext: &[u8], password: &SecretString, params: &KdfParams) -> GuardResult<Vec<u8>> {
    let header = Header::random();
    let key = derive_key(password, &header.salt, params)?;

    let ciphertext = cipher_for(&key)
        .encrypt(Nonce::from_slice(&header.nonce), plaintext)
        .map_err(|_| GuardError::format("plaintext too large for a single envelope"))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt an envelope produced by [`seal`].
///
/// Fails with [`GuardError::Format`] if the envelope cannot hold a header and
/// with [`GuardError::Authentication`] if the tag does not verify. No plaintext
/// is returned unless authentication succeeded.
pub fn open(envelope: &[u8], password: &SecretString, params: &KdfParams) -> GuardResult<Vec<u8>> {
    if envelope.len() < HEADER_SIZE {
        return Err(GuardError::Format(format!(
            "envelope too short: {} bytes (minimum {HEADER_SIZE})",
            envelope.len()
        )));
    }

    let (header_bytes, ciphertext) = envelope.split_at(HEADER_SIZE);
    let header_bytes: &[u8; HEADER_SIZE] = header_bytes
        .try_into()
        .map_err(|_| GuardError::format("envelope header"))?;
    let header = Header::from_bytes(header_bytes);
    let key = derive_key(password, &header.salt, params)?;

    cipher_for(&key)
        .decrypt(Nonce::from_slice(&header.nonce), ciphertext)
        .map_err(|_| GuardError::Authentication)
}

/// Seal arbitrary bytes and render the envelope as standard base64.
pub fn seal_base64(
    plaintext: &[u8],
    password: &SecretString,
    params: &KdfParams,
) -> GuardResult<String> {
    Ok(STANDARD.encode(seal(plaintext, password, params)?))
}

/// Open a base64 envelope produced by [`seal_base64`] or [`encrypt_text`].
///
/// Surrounding whitespace is ignored.
pub fn open_base64(
    envelope_b64: &str,
    password: &SecretString,
    params: &KdfParams,
) -> GuardResult<Vec<u8>> {
    let envelope = STANDARD
        .decode(envelope_b64.trim())
        .map_err(|e| GuardError::Format(format!("base64 decode: {e}")))?;
    open(&envelope, password, params)
}

/// Encrypt UTF-8 text and render the envelope as base64.
pub fn encrypt_text(
    plaintext: &str,
    password: &SecretString,
    params: &KdfParams,
) -> GuardResult<String> {
    seal_base64(plaintext.as_bytes(), password, params)
}

/// Decrypt a base64 envelope produced by [`encrypt_text`].
pub fn decrypt_text(
    envelope_b64: &str,
    password: &SecretString,
    params: &KdfParams,
) -> GuardResult<String> {
    let plaintext = open_base64(envelope_b64, password, params)?;
    String::from_utf8(plaintext)
        .map_err(|_| GuardError::format("decrypted payload is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TAG_SIZE;

    const FAST: KdfParams = KdfParams { iterations: 1_000 };

    fn pw(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let plaintext = b"hello, encrypted world!";
        let envelope = seal(plaintext, &pw("hunter2"), &FAST).unwrap();
        let decrypted = open(&envelope, &pw("hunter2"), &FAST).unwrap();
        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_seal_open_empty() {
        let envelope = seal(b"", &pw("pw"), &FAST).unwrap();
        assert_eq!(envelope.len(), HEADER_SIZE + TAG_SIZE);
        assert_eq!(open(&envelope, &pw("pw"), &FAST).unwrap(), b"");
    }

    #[test]
    fn test_envelope_size() {
        let envelope = seal(&[0u8; 1000], &pw("pw"), &FAST).unwrap();
        // salt (16) + nonce (12) + plaintext (1000) + tag (16)
        assert_eq!(envelope.len(), 16 + 12 + 1000 + 16);
    }

    #[test]
    fn test_same_input_different_envelopes() {
        let a = seal(b"same", &pw("pw"), &FAST).unwrap();
        let b = seal(b"same", &pw("pw"), &FAST).unwrap();

        assert_ne!(a[..SALT_SIZE], b[..SALT_SIZE], "salt must be fresh");
        assert_ne!(a[SALT_SIZE..HEADER_SIZE], b[SALT_SIZE..HEADER_SIZE], "nonce must be fresh");
        assert_ne!(a, b);
        assert_eq!(open(&a, &pw("pw"), &FAST).unwrap(), b"same");
        assert_eq!(open(&b, &pw("pw"), &FAST).unwrap(), b"same");
    }

    #[test]
    fn test_wrong_password() {
        let envelope = seal(b"secret data", &pw("right"), &FAST).unwrap();
        let err = open(&envelope, &pw("wrong"), &FAST).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_tampered_ciphertext() {
        let mut envelope = seal(b"secret data", &pw("pw"), &FAST).unwrap();
        envelope[HEADER_SIZE + 1] ^= 0x01;
        assert!(open(&envelope, &pw("pw"), &FAST).unwrap_err().is_authentication());
    }

    #[test]
    fn test_tampered_header() {
        let mut envelope = seal(b"secret data", &pw("pw"), &FAST).unwrap();
        envelope[0] ^= 0x80;
        assert!(open(&envelope, &pw("pw"), &FAST).unwrap_err().is_authentication());

        let mut envelope = seal(b"secret data", &pw("pw"), &FAST).unwrap();
        envelope[SALT_SIZE] ^= 0x80;
        assert!(open(&envelope, &pw("pw"), &FAST).unwrap_err().is_authentication());
    }

    #[test]
    fn test_too_short_is_format_error() {
        let err = open(&[0u8; HEADER_SIZE - 1], &pw("pw"), &FAST).unwrap_err();
        assert!(matches!(err, GuardError::Format(_)));
    }

    #[test]
    fn test_header_only_fails_authentication() {
        // Long enough to parse, too short to carry a tag
        let err = open(&[0u8; HEADER_SIZE], &pw("pw"), &FAST).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_text_roundtrip() {
        let encrypted = encrypt_text("Secret text", &pw("mypassword"), &FAST).unwrap();
        assert_eq!(
            decrypt_text(&encrypted, &pw("mypassword"), &FAST).unwrap(),
            "Secret text"
        );
        assert!(decrypt_text(&encrypted, &pw("wrongpassword"), &FAST)
            .unwrap_err()
            .is_authentication());
    }

    #[test]
    fn test_text_tolerates_trailing_newline() {
        let encrypted = encrypt_text("line", &pw("pw"), &FAST).unwrap();
        let with_newline = format!("{encrypted}\n");
        assert_eq!(decrypt_text(&with_newline, &pw("pw"), &FAST).unwrap(), "line");
    }

    #[test]
    fn test_base64_binary_roundtrip() {
        let data = [0u8, 0xff, 0x10, 0x80];
        let encoded = seal_base64(&data, &pw("pw"), &FAST).unwrap();
        assert_eq!(open_base64(&encoded, &pw("pw"), &FAST).unwrap(), data);
    }

    #[test]
    fn test_text_invalid_base64() {
        let err = decrypt_text("not base64!!", &pw("pw"), &FAST).unwrap_err();
        assert!(matches!(err, GuardError::Format(_)));
    }

    #[test]
    fn test_text_non_utf8_plaintext() {
        let envelope = seal(&[0xff, 0xfe, 0xfd], &pw("pw"), &FAST).unwrap();
        let b64 = STANDARD.encode(envelope);
        let err = decrypt_text(&b64, &pw("pw"), &FAST).unwrap_err();
        assert!(matches!(err, GuardError::Format(_)));
    }
}
