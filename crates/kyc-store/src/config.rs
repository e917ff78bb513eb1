//! Pinning service configuration.
//!
//! Defaults point at the public Pinata endpoints. Override via environment
//! variables or explicit construction for staging and tests.

use url::Url;

/// Default size limit for a single upload (10 MiB).
pub const DEFAULT_MAX_BLOB_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for the HTTP pinning store.
///
/// Custom `Debug` redacts the `jwt` field.
#[derive(Clone)]
pub struct PinningConfig {
    /// Base URL of the pinning API.
    pub api_url: Url,
    /// Base URL of the read gateway.
    pub gateway_url: Url,
    /// Bearer token for the pinning API.
    pub jwt: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Uploads larger than this are rejected locally as quota errors.
    pub max_blob_bytes: usize,
}

impl std::fmt::Debug for PinningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinningConfig")
            .field("api_url", &self.api_url)
            .field("gateway_url", &self.gateway_url)
            .field("jwt", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_blob_bytes", &self.max_blob_bytes)
            .finish()
    }
}

impl PinningConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `KYC_PINNING_API_URL` (default: `https://api.pinata.cloud`)
    /// - `KYC_GATEWAY_URL` (default: `https://gateway.pinata.cloud`)
    /// - `KYC_PINNING_JWT` (required)
    /// - `KYC_STORE_TIMEOUT_SECS` (default: 30)
    /// - `KYC_MAX_BLOB_BYTES` (default: 10 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt = std::env::var("KYC_PINNING_JWT").map_err(|_| ConfigError::MissingToken)?;
        Ok(Self {
            api_url: env_url("KYC_PINNING_API_URL", "https://api.pinata.cloud")?,
            gateway_url: env_url("KYC_GATEWAY_URL", "https://gateway.pinata.cloud")?,
            jwt,
            timeout_secs: env_parse("KYC_STORE_TIMEOUT_SECS", 30),
            max_blob_bytes: env_parse("KYC_MAX_BLOB_BYTES", DEFAULT_MAX_BLOB_BYTES),
        })
    }

    /// Point both endpoints at one local mock server.
    pub fn local_mock(base: &str, token: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base).map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()))?;
        Ok(Self {
            api_url: url.clone(),
            gateway_url: url,
            jwt: token.to_string(),
            timeout_secs: 5,
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("KYC_PINNING_JWT environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = PinningConfig::local_mock("http://127.0.0.1:9000", "jwt").unwrap();
        assert_eq!(cfg.api_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.gateway_url, cfg.api_url);
        assert_eq!(cfg.max_blob_bytes, DEFAULT_MAX_BLOB_BYTES);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = PinningConfig::local_mock("http://127.0.0.1:9000", "super-secret").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("KYC_NONEXISTENT_VAR_7731", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn local_mock_rejects_garbage() {
        assert!(PinningConfig::local_mock("not a url", "t").is_err());
    }
}
