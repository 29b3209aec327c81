//! cryptoguard-crypto: password-based authenticated encryption
//!
//! Every encryption derives a fresh key from the password and a random salt,
//! then seals with AES-256-GCM under a random nonce.
//!
//! Single-shot envelope (text channel, steganography payloads):
//! ```text
//! [16 bytes: salt][12 bytes: nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Chunked stream envelope (file channels), see [`stream`]:
//! ```text
//! [16 bytes: salt][12 bytes: base nonce]{[u32 BE len][sealed chunk]}*
//! ```
//!
//! Both layouts start with `salt || nonce`, so the header can be split off
//! before any key derivation happens.

pub mod envelope;
pub mod file;
pub mod kdf;
pub mod stream;

pub use envelope::{decrypt_text, encrypt_text, open, open_base64, seal, seal_base64};
pub use file::{decrypt_file, encrypt_file};
pub use kdf::{derive_key, DerivedKey, KdfParams};
pub use stream::{decrypt_stream, encrypt_stream, StreamParams};

/// Size of a derived key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of the PBKDF2 salt
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// `salt || nonce` prefix shared by every envelope
pub const HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE;
