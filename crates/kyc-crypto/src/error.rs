//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from the crypto envelope.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// No key was configured.
    #[error("encryption key is not configured (set {0})")]
    MissingKey(&'static str),

    /// The configured key is not 32 bytes of hex.
    #[error("malformed encryption key: {0}")]
    MalformedKey(String),

    /// The sealed record is shorter than a nonce plus authentication tag.
    #[error("sealed record truncated: {0}")]
    Truncated(String),

    /// The record was sealed with an algorithm this envelope does not speak.
    #[error("unsupported envelope algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Authentication tag mismatch: wrong key, wrong associated data, or tampering.
    #[error("authentication failed: ciphertext was tampered with or sealed under a different key")]
    AuthenticationFailed,

    /// Sealing failed inside the cipher.
    #[error("encryption failed")]
    EncryptionFailed,

    /// The plaintext could not be (de)serialized.
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
