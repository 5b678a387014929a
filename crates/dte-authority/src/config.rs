//! Authority client configuration.
//!
//! Endpoint paths and retry limits are explicit values passed to
//! [`HttpAuthorityClient`](crate::HttpAuthorityClient) and the
//! [`Transmitter`](crate::Transmitter) at construction. Nothing here is
//! mutated at runtime.

use std::str::FromStr;
use std::time::Duration;

/// Connection and retry settings for the Authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityConfig {
    /// Base URL, without trailing slash (e.g. `https://palena.example.gob`).
    pub base_url: String,
    /// Path of the seed (challenge) endpoint.
    pub seed_path: String,
    /// Path of the token exchange endpoint.
    pub token_path: String,
    /// Path of the document/batch upload endpoint.
    pub upload_path: String,
    /// Path of the status query endpoint.
    pub status_path: String,
    /// Per-request timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// Upload attempts before a submission is left `SubmissionFailed` (default: 3).
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt (default: 200ms).
    pub base_backoff_ms: u64,
    /// Token lifetime when the Authority does not declare one (default: 3000s).
    pub default_token_lifetime_secs: u64,
}

impl AuthorityConfig {
    /// Configuration with default paths and limits for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            seed_path: "/auth/seed".to_string(),
            token_path: "/auth/token".to_string(),
            upload_path: "/dte/upload".to_string(),
            status_path: "/dte/status".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            base_backoff_ms: 200,
            default_token_lifetime_secs: 3000,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DTE_AUTHORITY_URL` (required)
    /// - `DTE_AUTHORITY_TIMEOUT_SECS` (default: 30)
    /// - `DTE_SUBMIT_MAX_ATTEMPTS` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("DTE_AUTHORITY_URL")
            .map_err(|_| ConfigError::Missing("DTE_AUTHORITY_URL".to_string()))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "DTE_AUTHORITY_URL".to_string(),
                value: base_url,
                reason: "must be an http(s) URL".to_string(),
            });
        }
        let mut config = Self::new(base_url);
        config.timeout_secs = env_parse("DTE_AUTHORITY_TIMEOUT_SECS", 30)?;
        config.max_attempts = env_parse("DTE_SUBMIT_MAX_ATTEMPTS", 3)?;
        if config.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "DTE_SUBMIT_MAX_ATTEMPTS".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(config)
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full URL of an endpoint path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Read `var` and parse it, falling back to `default` when unset.
pub fn env_parse<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}
