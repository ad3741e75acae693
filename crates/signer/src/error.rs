//! Signer error types.

use std::time::Duration;
use thiserror::Error;

/// Signing identity errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("key import failed: {0}")]
    Import(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("signing identity is not active")]
    NotActive,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for signing operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
