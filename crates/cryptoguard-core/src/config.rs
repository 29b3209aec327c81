use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GuardError, GuardResult, IoContext};
use crate::MAX_CHUNK_SIZE;

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub log: LogConfig,
    pub crypto: CryptoConfig,
    pub folder: FolderConfig,
    pub steg: StegConfig,
}

impl GuardConfig {
    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> GuardResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .io_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| GuardError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GuardResult<()> {
        if self.crypto.pbkdf2_iterations == 0 {
            return Err(GuardError::Config(
                "crypto.pbkdf2_iterations must be at least 1".into(),
            ));
        }
        if self.crypto.chunk_size == 0 || self.crypto.chunk_size > MAX_CHUNK_SIZE {
            return Err(GuardError::Config(format!(
                "crypto.chunk_size must be between 1 and {MAX_CHUNK_SIZE}, got {}",
                self.crypto.chunk_size
            )));
        }
        if self.steg.framing == StegFraming::Marker && self.steg.marker.is_empty() {
            return Err(GuardError::Config(
                "steg.marker must be set when framing = \"marker\"".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 rounds (default: 100000). Must match between encrypt and decrypt.
    pub pbkdf2_iterations: u32,
    /// Plaintext bytes per sealed record in file envelopes (default: 64 KiB)
    pub chunk_size: usize,
}

/// Defaults for the folder commands. CLI flags can only switch these on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub recursive: bool,
    pub delete_original: bool,
    pub bundle_first: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StegFraming {
    /// 32-bit length header ahead of the payload
    #[default]
    Length,
    /// Payload terminated by a literal marker
    Marker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StegConfig {
    pub framing: StegFraming,
    /// End marker used when `framing = "marker"`
    pub marker: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            chunk_size: 64 * 1024,
        }
    }
}

impl Default for StegConfig {
    fn default() -> Self {
        Self {
            framing: StegFraming::Length,
            marker: "<<<END>>>".into(),
        }
    }
}
