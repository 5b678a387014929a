//! Issuance configuration.
//!
//! Values are read once at startup and passed to
//! [`IssuanceService`](crate::IssuanceService) by value.

use std::path::PathBuf;
use std::time::Duration;

use dte_authority::{env_parse, ConfigError};
use dte_core::TaxId;
use dte_document::TaxRate;

/// Jurisdiction and polling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceConfig {
    /// Tax rate applied to the net bucket (default: 19.00%).
    pub tax_rate: TaxRate,
    /// Seconds between status polls of in-flight submissions (default: 60).
    pub poll_interval_secs: u64,
    /// Taxpayer expected to submit. When set, an account whose certificate
    /// names another holder cannot issue or upload.
    pub sender_tax_id: Option<TaxId>,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            tax_rate: TaxRate::STANDARD,
            poll_interval_secs: 60,
            sender_tax_id: None,
        }
    }
}

impl IssuanceConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DTE_TAX_RATE_BP` (default: 1900)
    /// - `DTE_POLL_INTERVAL_SECS` (default: 60)
    /// - `DTE_SENDER_TAX_ID` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let bp: u32 = env_parse("DTE_TAX_RATE_BP", TaxRate::STANDARD.basis_points())?;
        let tax_rate = TaxRate::from_basis_points(bp).map_err(|e| ConfigError::Invalid {
            var: "DTE_TAX_RATE_BP".to_string(),
            value: bp.to_string(),
            reason: e.to_string(),
        })?;
        let poll_interval_secs = env_parse("DTE_POLL_INTERVAL_SECS", 60u64)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "DTE_POLL_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let sender_tax_id = match std::env::var("DTE_SENDER_TAX_ID") {
            Ok(raw) => Some(TaxId::new(raw.clone()).map_err(|e| ConfigError::Invalid {
                var: "DTE_SENDER_TAX_ID".to_string(),
                value: raw,
                reason: e.to_string(),
            })?),
            Err(_) => None,
        };
        Ok(Self {
            tax_rate,
            poll_interval_secs,
            sender_tax_id,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Where file-backed credentials live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialConfig {
    /// One subdirectory per account.
    pub dir: PathBuf,
}

impl CredentialConfig {
    /// `DTE_CREDENTIALS_DIR` (default: `./credentials`).
    pub fn from_env() -> Self {
        let dir = std::env::var("DTE_CREDENTIALS_DIR").unwrap_or_else(|_| "./credentials".to_string());
        Self { dir: dir.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = IssuanceConfig::default();
        assert_eq!(cfg.tax_rate.basis_points(), 1900);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        assert!(cfg.sender_tax_id.is_none());
    }
}
