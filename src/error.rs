//! Centralized error types for mimedecode.
//!
//! The decoding core itself never surfaces these: `parser::message::decode`
//! turns every failure into a degraded record. They show up only at the file
//! and export boundaries.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mimedecode library.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified message file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The message is larger than the configured limit.
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    /// Something inside the decoder went wrong (including a caught panic).
    #[error("Internal decoding failure: {0}")]
    Internal(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience alias for `Result<T, DecodeError>`.
pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
