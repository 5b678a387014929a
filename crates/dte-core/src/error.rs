//! # Error Types — Shared Error Taxonomy
//!
//! Each crate in the workspace owns a `thiserror` enum for its own failure
//! modes. All of them classify into [`ErrorKind`], the machine-readable
//! kind surfaced to the business layer alongside the Authority's raw
//! detail message.
//!
//! ## Retry policy by kind
//!
//! | Kind                  | Retried?                               |
//! |-----------------------|----------------------------------------|
//! | `Validation`          | never; caller corrects the input       |
//! | `ResourceExhaustion`  | never; needs an administrative grant   |
//! | `ConcurrencyConflict` | never; caller requests a fresh folio   |
//! | `Credential`          | never; operator action                 |
//! | `Transport`           | bounded backoff inside the client      |
//! | `Protocol`            | never; raw payload is logged           |
//! | `Rejected`            | never; the Authority said no           |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed input document or request.
    Validation,
    /// A folio range is exhausted.
    ResourceExhaustion,
    /// A specific folio is already in use.
    ConcurrencyConflict,
    /// Signing material is missing, expired, or unusable.
    Credential,
    /// Timeouts, connection failures, 5xx responses.
    Transport,
    /// The Authority returned something unrecognized or malformed.
    Protocol,
    /// The Authority rejected the request synchronously.
    Rejected,
    /// The referenced record does not exist.
    NotFound,
    /// Persistence layer failure.
    Storage,
}

impl ErrorKind {
    /// The canonical string name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::Credential => "CREDENTIAL_ERROR",
            Self::Transport => "TRANSPORT_ERROR",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Rejected => "REJECTED",
            Self::NotFound => "NOT_FOUND",
            Self::Storage => "STORAGE_ERROR",
        }
    }

    /// Whether an operation failing with this kind may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failure for a domain primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Account identifier is empty or contains disallowed characters.
    #[error("invalid account id {value:?}: {reason}")]
    InvalidAccountId {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Tax identifier does not match `digits-checkchar`.
    #[error("invalid tax id {value:?}: {reason}")]
    InvalidTaxId {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Unknown document kind code.
    #[error("unknown document kind code {0}")]
    UnknownDocumentKind(u16),

    /// Folio zero is never issued.
    #[error("folio must be positive")]
    ZeroFolio,

    /// Tracking identifier is empty.
    #[error("tracking id must not be empty")]
    EmptyTrackingId,
}

/// Failure while reading or writing XML.
#[derive(Error, Debug)]
pub enum XmlError {
    /// Element or attribute name is not a valid XML name.
    #[error("invalid XML name {0:?}")]
    InvalidName(String),

    /// Underlying parser error.
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    /// Attribute could not be read.
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Element expected by the caller is absent.
    #[error("missing element <{0}>")]
    MissingElement(String),

    /// Document structure does not match the expected shape.
    #[error("unexpected XML structure: {0}")]
    Structure(String),

    /// Input parsed, but is not byte-identical to its canonical rendering.
    #[error("XML is not in canonical form")]
    NotCanonical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_retryable() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::ResourceExhaustion,
            ErrorKind::ConcurrencyConflict,
            ErrorKind::Credential,
            ErrorKind::Transport,
            ErrorKind::Protocol,
            ErrorKind::Rejected,
            ErrorKind::NotFound,
            ErrorKind::Storage,
        ];
        let retryable: Vec<_> = kinds.iter().filter(|k| k.is_retryable()).collect();
        assert_eq!(retryable, vec![&ErrorKind::Transport]);
    }

    #[test]
    fn kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::ResourceExhaustion).unwrap();
        assert_eq!(json, "\"RESOURCE_EXHAUSTION\"");
        assert_eq!(ErrorKind::ResourceExhaustion.as_str(), "RESOURCE_EXHAUSTION");
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError::UnknownDocumentKind(99);
        assert!(err.to_string().contains("99"));
    }
}
