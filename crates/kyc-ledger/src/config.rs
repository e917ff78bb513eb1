//! Ledger gateway configuration.

use url::Url;

/// Configuration for [`LedgerGateway`](crate::LedgerGateway).
///
/// Custom `Debug` redacts the `token` field.
#[derive(Clone)]
pub struct LedgerGatewayConfig {
    /// Base URL of the REST gateway.
    pub base_url: Url,
    /// Bearer token for the gateway.
    pub token: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Interval between transaction status polls.
    pub poll_interval_ms: u64,
}

impl std::fmt::Debug for LedgerGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGatewayConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

impl LedgerGatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `KYC_LEDGER_URL` (default: `http://127.0.0.1:8700`)
    /// - `KYC_LEDGER_TOKEN` (required)
    /// - `KYC_LEDGER_TIMEOUT_SECS` (default: 30)
    /// - `KYC_LEDGER_POLL_MS` (default: 500)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("KYC_LEDGER_URL").unwrap_or_else(|_| "http://127.0.0.1:8700".into());
        let base_url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(raw.clone(), e.to_string()))?;
        let token = std::env::var("KYC_LEDGER_TOKEN").map_err(|_| ConfigError::MissingToken)?;
        let timeout_secs = std::env::var("KYC_LEDGER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let poll_interval_ms = std::env::var("KYC_LEDGER_POLL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);
        Ok(Self {
            base_url,
            token,
            timeout_secs,
            poll_interval_ms,
        })
    }

    /// Configuration pointing at a local mock server.
    pub fn local_mock(base: &str, token: &str) -> Result<Self, ConfigError> {
        let base_url =
            Url::parse(base).map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            token: token.to_string(),
            timeout_secs: 5,
            poll_interval_ms: 10,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("KYC_LEDGER_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid ledger URL {0:?}: {1}")]
    InvalidUrl(String, String),
}
