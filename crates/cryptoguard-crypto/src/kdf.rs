//! Key derivation: password + salt → AES-256 key via PBKDF2-HMAC-SHA256

use cryptoguard_core::{GuardError, GuardResult};
use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from a password. Never stored, never logged.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters.
///
/// Not recorded in the envelope: encrypt and decrypt must use the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 100_000,
        }
    }
}

/// Derive a 256-bit key from a password and a 16-byte salt.
///
/// Deterministic in `(password, salt, params)`; a fresh salt per encryption
/// makes keys for the same password unlinkable.
pub fn derive_key(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> GuardResult<DerivedKey> {
    if params.iterations == 0 {
        return Err(GuardError::Config(
            "PBKDF2 iteration count must be at least 1".into(),
        ));
    }

    // Derive directly into the zeroizing buffer
    let mut key = DerivedKey {
        bytes: [0u8; KEY_SIZE],
    };
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut key.bytes,
    );
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fast params for testing
    const FAST: KdfParams = KdfParams { iterations: 1_000 };

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("test-password-123");
        let salt = [1u8; SALT_SIZE];

        let key1 = derive_key(&password, &salt, &FAST).unwrap();
        let key2 = derive_key(&password, &salt, &FAST).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = [1u8; SALT_SIZE];

        let key1 = derive_key(&SecretString::from("password-a"), &salt, &FAST).unwrap();
        let key2 = derive_key(&SecretString::from("password-b"), &salt, &FAST).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-password");

        let key1 = derive_key(&password, &[1u8; SALT_SIZE], &FAST).unwrap();
        let key2 = derive_key(&password, &[2u8; SALT_SIZE], &FAST).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_kdf_iterations_matter() {
        let password = SecretString::from("same-password");
        let salt = [7u8; SALT_SIZE];

        let key1 = derive_key(&password, &salt, &KdfParams { iterations: 1 }).unwrap();
        let key2 = derive_key(&password, &salt, &KdfParams { iterations: 2 }).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_zero_iterations_rejected() {
        let result = derive_key(
            &SecretString::from("pw"),
            &[0u8; SALT_SIZE],
            &KdfParams { iterations: 0 },
        );
        assert!(matches!(result, Err(GuardError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = derive_key(&SecretString::from("pw"), &[0u8; SALT_SIZE], &FAST).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
    }
}
