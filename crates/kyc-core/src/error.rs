//! # Core Error Types
//!
//! Validation and canonicalization failures raised by the foundational
//! types. Component crates define their own error enums at their
//! boundary and convert from these where needed.

use thiserror::Error;

/// Errors raised while constructing or parsing core types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// An identifier failed validation.
    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier {
        /// Identifier namespace (e.g. `cid`, `user id`).
        kind: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A timestamp could not be parsed or was not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
