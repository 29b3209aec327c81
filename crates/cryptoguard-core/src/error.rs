use std::io;

use thiserror::Error;

pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    /// Envelope or archive is truncated, malformed, or not what it claims to be.
    #[error("format error: {0}")]
    Format(String),

    /// AEAD tag verification failed. Wrong password and tampering are indistinguishable.
    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,

    #[error("payload needs {required} bits but carrier only holds {available}")]
    CapacityExceeded { required: u64, available: u64 },

    #[error("end marker not found in carrier")]
    MarkerNotFound,

    #[error("archive entry escapes destination root: {0}")]
    PathTraversal(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl GuardError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

impl From<io::Error> for GuardError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            context: "I/O error".into(),
            source,
        }
    }
}

/// Attach a human-readable operation description to an `io::Result`.
pub trait IoContext<T> {
    fn io_context<C, F>(self, f: F) -> GuardResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<C, F>(self, f: F) -> GuardResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| GuardError::Io {
            context: f().into(),
            source,
        })
    }
}
