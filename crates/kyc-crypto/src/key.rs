//! # Envelope Key
//!
//! The 256-bit secret key, injected once at startup. The key bytes are
//! zeroized when the last owner drops them.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Environment variable holding the hex-encoded key.
pub const KEY_ENV_VAR: &str = "KYC_ENCRYPTION_KEY";

/// A 256-bit envelope key.
///
/// Custom `Debug` redacts the key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey([u8; KEY_LEN]);

impl EnvelopeKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut decoded = hex::decode(s.trim())
            .map_err(|e| CryptoError::MalformedKey(format!("not hex: {e}")))?;
        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::MalformedKey(format!(
                "expected {KEY_LEN} bytes, got {len}"
            )));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }

    /// Load the key from `KYC_ENCRYPTION_KEY`.
    pub fn from_env() -> Result<Self, CryptoError> {
        let mut raw =
            std::env::var(KEY_ENV_VAR).map_err(|_| CryptoError::MissingKey(KEY_ENV_VAR))?;
        if raw.trim().is_empty() {
            return Err(CryptoError::MissingKey(KEY_ENV_VAR));
        }
        let key = Self::from_hex(&raw);
        raw.zeroize();
        key
    }

    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Hex rendering, for key provisioning only.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnvelopeKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let key = EnvelopeKey::generate();
        let parsed = EnvelopeKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert!(matches!(
            EnvelopeKey::from_hex("abcd"),
            Err(CryptoError::MalformedKey(_))
        ));
        assert!(matches!(
            EnvelopeKey::from_hex(&"zz".repeat(32)),
            Err(CryptoError::MalformedKey(_))
        ));
    }

    #[test]
    fn debug_is_redacted() {
        let key = EnvelopeKey::from_bytes([7u8; KEY_LEN]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("0707"));
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(
            EnvelopeKey::generate().as_bytes(),
            EnvelopeKey::generate().as_bytes()
        );
    }
}
