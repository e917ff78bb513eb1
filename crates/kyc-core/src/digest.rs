//! # Content Digest
//!
//! `ContentDigest` and `DigestAlgorithm` back both the audit hash chain
//! and the content identifiers minted by the in-memory content store.
//!
//! Structured values are hashed through [`sha256_digest`], which accepts
//! only `&CanonicalBytes`. Opaque blobs (sealed identity manifests,
//! document ciphertexts) are hashed as-is through [`sha256_bytes`]; they
//! are already a fixed byte sequence and have no canonical form.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::CoreError;

/// The hash algorithm used to produce a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content digest with its algorithm tag.
///
/// Serializes as the self-describing string `sha256:<64 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a new content digest from raw bytes and algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidIdentifier {
            kind: "content digest",
            reason: format!("{reason}: {s:?}"),
        };
        let encoded = s
            .strip_prefix("sha256:")
            .ok_or_else(|| invalid("missing sha256: prefix"))?;
        if encoded.len() != 64 {
            return Err(invalid("expected 64 hex characters"));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(encoded, &mut bytes).map_err(|_| invalid("non-hex digest"))?;
        Ok(Self::new(DigestAlgorithm::Sha256, bytes))
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.to_string()
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Compute a SHA-256 content digest from canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    sha256_bytes(data.as_bytes())
}

/// Compute a SHA-256 content digest over an opaque blob.
pub fn sha256_bytes(data: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(DigestAlgorithm::Sha256, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sha256_vector() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(
            sha256_digest(&cb).to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn display_and_parse_agree() {
        let d = sha256_bytes(b"sealed manifest");
        let s = d.to_string();
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), 7 + 64);
        let parsed: ContentDigest = s.parse().unwrap();
        assert_eq!(parsed, d);
    }

    #[test]
    fn serializes_as_string() {
        let d = sha256_bytes(b"x");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json, serde_json::Value::String(d.to_string()));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("md5:abcd".parse::<ContentDigest>().is_err());
        assert!("sha256:abcd".parse::<ContentDigest>().is_err());
        let bad_hex = format!("sha256:{}", "zz".repeat(32));
        assert!(bad_hex.parse::<ContentDigest>().is_err());
    }

    #[test]
    fn different_blobs_different_digests() {
        assert_ne!(sha256_bytes(b"a"), sha256_bytes(b"b"));
    }
}
