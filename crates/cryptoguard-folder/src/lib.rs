//! cryptoguard-folder: directory-level encryption
//!
//! - [`walk`]: deterministic file enumeration under a root
//! - [`archive`]: zip bundling with explicit path-traversal rejection
//! - [`pipeline`]: per-file and bundled encrypt/decrypt of whole trees
//! - [`cleanup`]: best-effort removal of sources after success

pub mod archive;
pub mod cleanup;
pub mod pipeline;
pub mod walk;

pub use archive::{bundle, bundle_to_file, unbundle, unbundle_file, BundleStats};
pub use pipeline::{decrypt_bundle, decrypt_folder, encrypt_folder};
