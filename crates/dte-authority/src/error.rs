//! Authority client error types.

use dte_core::{ErrorKind, XmlError};
use dte_crypto::CryptoError;

use crate::config::ConfigError;

/// Errors from talking to the Authority.
///
/// A synchronous rejection of an upload is not an error: it is a normal
/// [`Outcome`](dte_state::Outcome) in the `Rejected` state.
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// The request did not complete within the configured timeout.
    #[error("timeout calling {endpoint}")]
    Timeout { endpoint: String },

    /// Connection failure or 5xx response.
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The Authority refused the bearer token.
    #[error("{endpoint} refused the session token (HTTP {status})")]
    Unauthorized { endpoint: String, status: u16 },

    /// Unexpected non-2xx status that is neither a transport failure nor
    /// an authentication failure.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The Authority declined to hand out a seed (service window, overload).
    #[error("seed unavailable: {detail}")]
    SeedUnavailable { detail: String },

    /// Signing the seed failed.
    #[error("signing the seed failed: {0}")]
    SigningFailed(#[source] CryptoError),

    /// The Authority refused to exchange the signed seed for a token.
    #[error("token rejected: {detail}")]
    TokenRejected { detail: String },

    /// A response code that no table knows about.
    #[error("unrecognized {family} code {code:?}")]
    UnknownCode {
        family: &'static str,
        code: String,
        payload: String,
    },

    /// A response body that does not have the expected shape.
    #[error("malformed {family} response: {reason}")]
    Malformed {
        family: &'static str,
        reason: String,
        payload: String,
    },

    /// A signed document could not be embedded in a batch.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// Credential material could not be loaded.
    #[error(transparent)]
    Credential(#[from] CryptoError),

    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AuthorityError {
    /// Machine-readable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } | Self::SeedUnavailable { .. } => ErrorKind::Transport,
            Self::Unauthorized { .. } | Self::TokenRejected { .. } => ErrorKind::Credential,
            Self::SigningFailed(e) | Self::Credential(e) => e.kind(),
            Self::HttpStatus { .. }
            | Self::UnknownCode { .. }
            | Self::Malformed { .. }
            | Self::Xml(_) => ErrorKind::Protocol,
            Self::InvalidBatch(_) | Self::Config(_) => ErrorKind::Validation,
        }
    }

    /// The raw Authority payload, for protocol errors.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            Self::UnknownCode { payload, .. } | Self::Malformed { payload, .. } => Some(payload),
            Self::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The Authority's own detail message, when it sent one.
    pub fn authority_detail(&self) -> Option<&str> {
        match self {
            Self::SeedUnavailable { detail } | Self::TokenRejected { detail } => Some(detail),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_retryable() {
        let timeout = AuthorityError::Timeout {
            endpoint: "upload".into(),
        };
        assert!(timeout.kind().is_retryable());
        let unknown = AuthorityError::UnknownCode {
            family: "upload",
            code: "42".into(),
            payload: "<UploadAck/>".into(),
        };
        assert_eq!(unknown.kind(), ErrorKind::Protocol);
        assert!(!unknown.kind().is_retryable());
        assert_eq!(unknown.raw_payload(), Some("<UploadAck/>"));
    }

    #[test]
    fn credential_kind_passes_through() {
        let err = AuthorityError::Credential(CryptoError::KeyMaterialMissing {
            account: "acme".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Credential);
    }

    #[test]
    fn seed_outage_is_transport_not_rejection() {
        let err = AuthorityError::SeedUnavailable {
            detail: "service window".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.authority_detail(), Some("service window"));
    }
}
