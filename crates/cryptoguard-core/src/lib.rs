//! cryptoguard-core: pieces shared by every cryptoguard crate
//!
//! - [`error`]: the [`GuardError`] taxonomy returned by all library operations
//! - [`config`]: the `config.toml` schema
//! - [`types`]: immutable per-call option values and progress reporting

pub mod config;
pub mod error;
pub mod types;

pub use error::{GuardError, GuardResult, IoContext};
pub use types::{FolderOptions, FolderReport, ProgressFn};

/// Suffix appended to a file name to mark its encrypted sibling (`name.ext` → `name.ext.enc`).
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Largest plaintext chunk a stream envelope may use (16 MiB).
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;
