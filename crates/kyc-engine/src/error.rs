//! # Engine Error Taxonomy
//!
//! Every component error is translated into [`KycError`] at the engine
//! boundary. `Display` keeps the precise cause for operator logs and the
//! audit trail; [`KycError::public_message`] is what an end user sees.

use kyc_audit::AuditError;
use kyc_core::{Cid, UserId};
use kyc_crypto::CryptoError;
use kyc_ledger::LedgerError;
use kyc_state::{GrantError, TransitionError};
use kyc_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generic message for failures the user can only retry.
pub const RETRY_LATER: &str = "operation failed, retry later";

/// The external step a verification operation failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStage {
    Encryption,
    Store,
    Ledger,
    Audit,
}

impl VerificationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encryption => "encryption",
            Self::Store => "store",
            Self::Ledger => "ledger",
            Self::Audit => "audit",
        }
    }
}

impl std::fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fieldless classification of a [`KycError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Crypto,
    StoreUnavailable,
    QuotaExceeded,
    Ledger,
    NotAuthorized,
    SubjectNotFound,
    NoActiveGrant,
    InvalidTransition,
    InvalidInput,
    IntegrityViolation,
    Audit,
    Internal,
}

/// Engine errors.
#[derive(Error, Debug)]
pub enum KycError {
    #[error("crypto envelope error: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    /// A verification operation failed at an external step. No state changed.
    #[error("verification failed at {stage} step: {source}")]
    Verification {
        stage: VerificationStage,
        #[source]
        source: Box<KycError>,
    },

    #[error("{principal} is not authorized: {reason}")]
    NotAuthorized { principal: UserId, reason: String },

    #[error("subject {0} not found")]
    SubjectNotFound(UserId),

    #[error("{grantor} holds no active grant on {subject}")]
    NoActiveGrant { grantor: UserId, subject: UserId },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced blob is missing or does not belong to the subject.
    #[error("integrity violation for {subject} at {cid}: {reason}")]
    IntegrityViolation {
        subject: UserId,
        cid: Cid,
        reason: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl KycError {
    /// Wrap `source` as a failure at `stage`.
    pub fn verification(stage: VerificationStage, source: impl Into<KycError>) -> Self {
        Self::Verification {
            stage,
            source: Box::new(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Store(StoreError::QuotaExceeded(_)) => ErrorKind::QuotaExceeded,
            Self::Store(_) => ErrorKind::StoreUnavailable,
            Self::Ledger(_) => ErrorKind::Ledger,
            Self::Audit(_) => ErrorKind::Audit,
            Self::Verification { source, .. } => source.kind(),
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::SubjectNotFound(_) => ErrorKind::SubjectNotFound,
            Self::NoActiveGrant { .. } => ErrorKind::NoActiveGrant,
            Self::InvalidTransition(TransitionError::InvalidTransition { .. }) => {
                ErrorKind::InvalidTransition
            }
            Self::InvalidTransition(_) | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The failing stage, for verification errors.
    pub fn stage(&self) -> Option<VerificationStage> {
        match self {
            Self::Verification { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable_put(),
            Self::Ledger(LedgerError::Exhausted { .. }) => true,
            Self::Ledger(e) => e.is_retryable(),
            Self::Verification { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Message safe to show an end user.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::NotAuthorized
            | ErrorKind::SubjectNotFound
            | ErrorKind::NoActiveGrant
            | ErrorKind::InvalidTransition
            | ErrorKind::InvalidInput => self.to_string(),
            _ => RETRY_LATER.to_string(),
        }
    }
}

impl From<GrantError> for KycError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::AlreadyActive { .. } => Self::Internal(err.to_string()),
            GrantError::NoActiveGrant { grantor } => Self::Internal(format!(
                "grant book for {grantor} changed under the subject lock"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_state::{KycStatus, SubjectAction};

    #[test]
    fn verification_kind_follows_its_source() {
        let err = KycError::verification(
            VerificationStage::Store,
            StoreError::QuotaExceeded("10 MiB".into()),
        );
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert_eq!(err.stage(), Some(VerificationStage::Store));
        assert!(err.is_retryable());
        assert_eq!(err.public_message(), RETRY_LATER);
        assert!(err.to_string().contains("10 MiB"));
    }

    #[test]
    fn authorization_errors_are_reported_precisely() {
        let who = UserId::new();
        let err = KycError::NotAuthorized {
            principal: who,
            reason: "organization role required".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        assert!(err.public_message().contains("organization role required"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transition_errors_split_into_transition_and_input() {
        let illegal: KycError = TransitionError::InvalidTransition {
            from: KycStatus::NotStarted,
            action: SubjectAction::CompleteChecklist,
        }
        .into();
        assert_eq!(illegal.kind(), ErrorKind::InvalidTransition);

        let blank: KycError = TransitionError::IncompleteIdentity("full_name").into();
        assert_eq!(blank.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn exhausted_ledger_is_retryable_later() {
        let err = KycError::verification(
            VerificationStage::Ledger,
            LedgerError::Exhausted {
                attempts: 3,
                last: Box::new(LedgerError::Transport("down".into())),
            },
        );
        assert_eq!(err.kind(), ErrorKind::Ledger);
        assert!(err.is_retryable());
    }
}
