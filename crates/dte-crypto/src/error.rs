//! # Cryptographic Error Types
//!
//! Structured errors for credential loading, signing, and verification.

use chrono::NaiveDate;
use dte_core::{ErrorKind, XmlError};
use thiserror::Error;

/// Errors from credential and signature operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// No signing material is registered for the account.
    #[error("key material missing for account {account}")]
    KeyMaterialMissing {
        /// The account that has no credentials.
        account: String,
    },

    /// The signing certificate is not valid on the document's issue date.
    #[error("certificate {serial} is not valid on {date} (valid {not_before} to {not_after})")]
    KeyMaterialExpired {
        /// Certificate serial number.
        serial: String,
        /// The date that was checked.
        date: NaiveDate,
        /// Start of the validity window.
        not_before: NaiveDate,
        /// End of the validity window.
        not_after: NaiveDate,
    },

    /// The signature could not be produced.
    #[error("signature failure: {0}")]
    SignatureFailure(String),

    /// A signature, digest, or certificate chain did not verify.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Private or public key bytes are malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Certificate content is malformed or inconsistent.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// XML rendering or parsing failed.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// Credential files could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Machine-readable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyMaterialMissing { .. }
            | Self::KeyMaterialExpired { .. }
            | Self::SignatureFailure(_)
            | Self::InvalidKey(_)
            | Self::InvalidCertificate(_)
            | Self::Io(_) => ErrorKind::Credential,
            Self::VerificationFailed(_) => ErrorKind::Protocol,
            Self::Xml(_) => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_display_names_window() {
        let err = CryptoError::KeyMaterialExpired {
            serial: "42".to_string(),
            date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            not_before: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            not_after: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2027-01-01"));
        assert!(msg.contains("2026-12-31"));
        assert_eq!(err.kind(), ErrorKind::Credential);
    }

    #[test]
    fn verification_failure_is_protocol_kind() {
        let err = CryptoError::VerificationFailed("digest mismatch".to_string());
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
