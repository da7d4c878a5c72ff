//! Error types for Tread
//!
//! This module defines the error taxonomy shared by every crate in the
//! workspace. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! | Variant | Meaning | Retry? |
//! |---------|---------|--------|
//! | `Validation` | malformed or unsafe query, bad filter types | never |
//! | `DimensionMismatch` | embedding/index dimension disagreement | never |
//! | `NotFound` | unknown vector id on a strict lookup | never |
//! | `Storage` | I/O failure during persistence | yes |
//! | `Serialization` | snapshot encode/decode failure | never |
//! | `Embedding` | the embedder capability failed | caller's call |
//! | `Config` | invalid `tread.toml` | never |
//!
//! Delete and metadata update treat unknown ids as no-ops, so `NotFound` is
//! only produced by lookups that promise a record.

use std::io;
use thiserror::Error;

/// Result type alias for Tread operations
pub type TreadResult<T> = std::result::Result<T, TreadError>;

/// Error types for the Tread retrieval engine
#[derive(Debug, Error)]
pub enum TreadError {
    /// Malformed or unsafe input supplied by the caller
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Vector dimension does not match the collection
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension configured for the collection
        expected: usize,
        /// Dimension of the offending vector
        got: usize,
    },

    /// Vector id not present in the collection
    #[error("Vector not found: {id}")]
    NotFound {
        /// The unknown id
        id: String,
    },

    /// Persistence layer failure (disk, network)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Embedder capability failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl TreadError {
    /// Build a validation error from any displayable message
    pub fn validation(message: impl Into<String>) -> Self {
        TreadError::Validation {
            message: message.into(),
        }
    }

    /// Check if this error is a caller-side validation failure
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            TreadError::Validation { .. } | TreadError::DimensionMismatch { .. }
        )
    }

    /// Check if retrying the same call may succeed
    ///
    /// Only storage failures are transient. Validation and dimension errors
    /// are doomed no matter how often they are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TreadError::Storage(_))
    }

    /// Check if this error reports a missing vector
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreadError::NotFound { .. })
    }
}

impl From<io::Error> for TreadError {
    fn from(e: io::Error) -> Self {
        TreadError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for TreadError {
    fn from(e: serde_json::Error) -> Self {
        TreadError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for TreadError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        TreadError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for TreadError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        TreadError::Serialization(e.to_string())
    }
}
