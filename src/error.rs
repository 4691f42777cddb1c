// src/error.rs
//
// Typed error taxonomy for gateway operations.
//
// Backends speak `anyhow::Error`; everything that crosses the public API is
// folded into `GatewayError` so callers can branch on the failure kind.

use thiserror::Error;

/// Failure kinds surfaced by the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Empty/whitespace path, illegal characters or a `..` segment.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path exceeds {max} characters ({len}): {path}")]
    PathTooLong { path: String, len: usize, max: usize },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("source and destination are the same location: {0}")]
    SameLocation(String),

    /// A multipart operation found the advisory lock held by another session.
    #[error("object `{key}` is locked by session {owner}")]
    ObjectLocked { key: String, owner: String },

    /// Unsupported mode/access combination, unknown session, out-of-order part.
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// The backend failed for reasons outside this layer's control.
    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

impl GatewayError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        GatewayError::InvalidPath { path: path.to_string(), reason: reason.into() }
    }

    /// Map a local I/O error, promoting the kinds that have a dedicated variant.
    pub(crate) fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => GatewayError::FileNotFound(path.to_string()),
            std::io::ErrorKind::AlreadyExists => GatewayError::AlreadyExists(path.to_string()),
            _ => GatewayError::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::FileNotFound(_))
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::StorageUnavailable(err)
    }
}
