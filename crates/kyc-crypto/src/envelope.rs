//! # Envelope Sealing
//!
//! `Envelope::seal` produces a [`SealedRecord`] carrying the algorithm
//! tag, the per-call nonce and the ciphertext (which includes the 16-byte
//! GCM tag). Both binary fields serialize as lowercase hex so sealed
//! records embed cleanly in JSON manifests.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::key::EnvelopeKey;

/// Algorithm tag written into every sealed record.
pub const ENVELOPE_ALGORITHM: &str = "aes-256-gcm";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Ciphertext plus the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    /// Envelope algorithm tag.
    pub algorithm: String,
    /// 96-bit nonce, unique per seal.
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext with the authentication tag appended.
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Authenticated encryption envelope bound to one key.
#[derive(Clone)]
pub struct Envelope {
    cipher: Aes256Gcm,
}

impl Envelope {
    /// Build an envelope from a key.
    pub fn new(key: &EnvelopeKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Build an envelope from `KYC_ENCRYPTION_KEY`.
    pub fn from_env() -> Result<Self, CryptoError> {
        Ok(Self::new(&EnvelopeKey::from_env()?))
    }

    /// Seal `plaintext`, authenticating `aad` alongside it.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<SealedRecord, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(SealedRecord {
            algorithm: ENVELOPE_ALGORITHM.to_string(),
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    /// Open a sealed record. `aad` must match what was passed to `seal`.
    pub fn open(&self, sealed: &SealedRecord, aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.algorithm != ENVELOPE_ALGORITHM {
            return Err(CryptoError::UnsupportedAlgorithm(sealed.algorithm.clone()));
        }
        if sealed.nonce.len() != NONCE_LEN {
            return Err(CryptoError::Truncated(format!(
                "nonce is {} bytes, expected {NONCE_LEN}",
                sealed.nonce.len()
            )));
        }
        if sealed.ciphertext.len() < TAG_LEN {
            return Err(CryptoError::Truncated(format!(
                "ciphertext is {} bytes, shorter than the {TAG_LEN}-byte tag",
                sealed.ciphertext.len()
            )));
        }
        self.cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: &sealed.ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Serialize `value` as JSON and seal it.
    pub fn seal_json<T: Serialize>(&self, value: &T, aad: &[u8]) -> Result<SealedRecord, CryptoError> {
        let plaintext = serde_json::to_vec(value)?;
        self.seal(&plaintext, aad)
    }

    /// Open a sealed record and deserialize the JSON plaintext.
    pub fn open_json<T: DeserializeOwned>(
        &self,
        sealed: &SealedRecord,
        aad: &[u8],
    ) -> Result<T, CryptoError> {
        let plaintext = self.open(sealed, aad)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("algorithm", &ENVELOPE_ALGORITHM)
            .finish_non_exhaustive()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
