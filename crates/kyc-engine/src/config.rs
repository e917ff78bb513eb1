//! Engine configuration.
//!
//! Read once at startup and passed to [`KycEngine::new`](crate::KycEngine::new).
//! Nothing in the engine reads the environment after construction.

use std::time::Duration;

use kyc_core::RetryPolicy;

/// Upper bound on any single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Retry policy for content store calls.
    pub store_retry: RetryPolicy,
    /// Retry policy for ledger submissions.
    pub ledger_retry: RetryPolicy,
    /// Bound on each ledger confirmation wait.
    pub confirmation_timeout: Duration,
    /// Compare grant-based `check` answers against the ledger in the
    /// background and reconcile on disagreement.
    pub reconcile_on_check: bool,
    /// Append a `failed` audit entry when a mutation aborts.
    pub audit_failures: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_retry: RetryPolicy::new(4, Duration::from_millis(200), MAX_BACKOFF),
            ledger_retry: RetryPolicy::new(3, Duration::from_millis(200), MAX_BACKOFF),
            confirmation_timeout: Duration::from_secs(30),
            reconcile_on_check: true,
            audit_failures: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `KYC_STORE_MAX_ATTEMPTS` (default: 4)
    /// - `KYC_LEDGER_MAX_ATTEMPTS` (default: 3)
    /// - `KYC_RETRY_BASE_DELAY_MS` (default: 200)
    /// - `KYC_CONFIRMATION_TIMEOUT_SECS` (default: 30)
    /// - `KYC_RECONCILE_ON_CHECK` (default: true)
    /// - `KYC_AUDIT_FAILURES` (default: true)
    pub fn from_env() -> Self {
        let base = Duration::from_millis(env_parse("KYC_RETRY_BASE_DELAY_MS", 200));
        Self {
            store_retry: RetryPolicy::new(env_parse("KYC_STORE_MAX_ATTEMPTS", 4), base, MAX_BACKOFF),
            ledger_retry: RetryPolicy::new(env_parse("KYC_LEDGER_MAX_ATTEMPTS", 3), base, MAX_BACKOFF),
            confirmation_timeout: Duration::from_secs(env_parse("KYC_CONFIRMATION_TIMEOUT_SECS", 30)),
            reconcile_on_check: env_parse("KYC_RECONCILE_ON_CHECK", true),
            audit_failures: env_parse("KYC_AUDIT_FAILURES", true),
        }
    }

    /// Same attempt budgets as the default with no backoff delay and a
    /// short confirmation bound.
    pub fn fast() -> Self {
        Self {
            store_retry: RetryPolicy::immediate(4),
            ledger_retry: RetryPolicy::immediate(3),
            confirmation_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.store_retry.max_attempts, 4);
        assert_eq!(cfg.ledger_retry.max_attempts, 3);
        assert_eq!(cfg.store_retry.delay_after(1), Duration::from_millis(200));
        assert_eq!(cfg.store_retry.delay_after(3), Duration::from_millis(800));
        assert!(cfg.reconcile_on_check);
        assert!(cfg.audit_failures);
    }

    #[test]
    fn unparsable_values_fall_back() {
        assert_eq!(env_parse("KYC_UNSET_ENGINE_VAR_4410", 7u32), 7);
    }
}
