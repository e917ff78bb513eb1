//! # kyc-crypto — Crypto Envelope
//!
//! Seals the sensitive identity payload (and uploaded document bytes)
//! before anything leaves the process for the content store.
//!
//! - **AES-256-GCM** authenticated encryption. A truncated or tampered
//!   ciphertext fails to open with [`CryptoError::AuthenticationFailed`]
//!   instead of yielding garbage plaintext.
//! - **Fresh 96-bit nonce per seal**, drawn from the OS RNG and stored
//!   next to the ciphertext in [`SealedRecord`]. Nonces are never reused.
//! - **Optional associated data.** The vault binds every sealed record to
//!   the owning subject id, so a blob replayed under another subject does
//!   not open.
//!
//! ## Crate Policy
//!
//! - Stateless apart from the key; [`Envelope`] is `Send + Sync` and safe
//!   for unlimited concurrent use.
//! - Key material is zeroized on drop and never printed by `Debug`.

pub mod envelope;
pub mod error;
pub mod key;

pub use envelope::{Envelope, SealedRecord, ENVELOPE_ALGORITHM};
pub use error::CryptoError;
pub use key::{EnvelopeKey, KEY_ENV_VAR, KEY_LEN};
