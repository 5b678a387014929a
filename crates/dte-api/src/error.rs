//! # API Error Types
//!
//! [`AppError`] implements `axum::response::IntoResponse`. Issuance errors
//! are mapped by their [`ErrorKind`] so every crate's failures land on the
//! same status code table:
//!
//! | Kind | Status |
//! |------|--------|
//! | `Validation` | 422 |
//! | `ConcurrencyConflict` | 409 |
//! | `ResourceExhaustion`, `Credential` | 424 |
//! | `Transport`, `Protocol`, `Rejected` | 502 |
//! | `NotFound` | 404 |
//! | `Storage` | 500 |
//!
//! Bodies carry the kind's code and, for Authority failures, the
//! Authority's own detail message. 500-class bodies never carry the
//! internal message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dte_core::ErrorKind;
use dte_issuance::IssuanceError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "REJECTED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Document id, folio, attempts, Authority detail when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Anything the issuance service refused.
    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    /// A path segment or body field failed validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// The body could not be deserialized (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (500). Logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ConcurrencyConflict => StatusCode::CONFLICT,
        ErrorKind::ResourceExhaustion | ErrorKind::Credential => StatusCode::FAILED_DEPENDENCY,
        ErrorKind::Transport | ErrorKind::Protocol | ErrorKind::Rejected => StatusCode::BAD_GATEWAY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Issuance(e) => (status_for(e.kind()), e.kind().as_str()),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<Value> {
        let Self::Issuance(err) = self else {
            return None;
        };
        let mut map = Map::new();
        match err {
            IssuanceError::SubmissionFailed {
                document_id,
                kind,
                folio,
                attempts,
                ..
            }
            | IssuanceError::NotDelivered {
                document_id,
                kind,
                folio,
                attempts,
                ..
            } => {
                map.insert("document_id".into(), document_id.to_string().into());
                map.insert("kind".into(), kind.code().into());
                map.insert("folio".into(), folio.value().into());
                map.insert("attempts".into(), (*attempts).into());
            }
            IssuanceError::Rejected { document_id, code, .. } => {
                map.insert("document_id".into(), document_id.to_string().into());
                map.insert("authority_code".into(), code.clone().into());
            }
            IssuanceError::InvalidState {
                document_id,
                state,
                operation,
            } => {
                map.insert("document_id".into(), document_id.to_string().into());
                map.insert("state".into(), state.as_str().into());
                map.insert("operation".into(), (*operation).into());
            }
            _ => {}
        }
        if let Some(detail) = err.authority_detail() {
            map.insert("authority_detail".into(), detail.into());
        }
        (!map.is_empty()).then_some(Value::Object(map))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let internal = status.is_server_error() && status != StatusCode::BAD_GATEWAY;

        if internal {
            tracing::error!(error = %self, "internal server error");
        } else if status == StatusCode::BAD_GATEWAY {
            tracing::warn!(error = %self, "authority failure");
        }

        let (message, details) = if internal {
            ("An internal error occurred".to_string(), None)
        } else {
            (self.to_string(), self.details())
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<dte_core::ValidationError> for AppError {
    fn from(err: dte_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dte_authority::AuthorityError;
    use dte_core::{DocumentId, DocumentKind, Folio};
    use dte_state::SubmissionState;

    #[test]
    fn every_kind_has_a_status() {
        let table = [
            (ErrorKind::Validation, 422),
            (ErrorKind::ConcurrencyConflict, 409),
            (ErrorKind::ResourceExhaustion, 424),
            (ErrorKind::Credential, 424),
            (ErrorKind::Transport, 502),
            (ErrorKind::Protocol, 502),
            (ErrorKind::Rejected, 502),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Storage, 500),
        ];
        for (kind, status) in table {
            assert_eq!(status_for(kind).as_u16(), status, "{kind:?}");
        }
    }

    #[test]
    fn unknown_document_is_not_found() {
        let err = AppError::from(IssuanceError::UnknownDocument(DocumentId::new()));
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
        assert!(err.details().is_none());
    }

    #[test]
    fn rejection_details_carry_authority_code_and_detail() {
        let id = DocumentId::new();
        let err = AppError::from(IssuanceError::Rejected {
            document_id: id,
            code: "2".to_string(),
            detail: "signature error".to_string(),
        });
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "REJECTED");
        let details = err.details().unwrap();
        assert_eq!(details["document_id"], id.to_string());
        assert_eq!(details["authority_code"], "2");
        assert_eq!(details["authority_detail"], "signature error");
    }

    #[test]
    fn submission_failure_details_name_the_folio() {
        let err = AppError::from(IssuanceError::SubmissionFailed {
            document_id: DocumentId::new(),
            kind: DocumentKind::Invoice,
            folio: Folio::new(100).unwrap(),
            attempts: 3,
            source: AuthorityError::Timeout {
                endpoint: "upload".to_string(),
            },
        });
        let details = err.details().unwrap();
        assert_eq!(details["kind"], 33);
        assert_eq!(details["folio"], 100);
        assert_eq!(details["attempts"], 3);
    }

    #[test]
    fn unrecognized_upload_answer_is_bad_gateway_with_folio() {
        let err = AppError::from(IssuanceError::NotDelivered {
            document_id: DocumentId::new(),
            kind: DocumentKind::Invoice,
            folio: Folio::new(100).unwrap(),
            attempts: 1,
            source: AuthorityError::UnknownCode {
                family: "upload",
                code: "4".to_string(),
                payload: "<UploadAck><Status>4</Status></UploadAck>".to_string(),
            },
        });
        assert_eq!(err.status_and_code(), (StatusCode::BAD_GATEWAY, "PROTOCOL_ERROR"));
        assert_eq!(err.details().unwrap()["folio"], 100);
    }

    #[test]
    fn invalid_state_is_conflict() {
        let err = AppError::from(IssuanceError::InvalidState {
            document_id: DocumentId::new(),
            state: SubmissionState::Accepted,
            operation: "resubmit",
        });
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
        assert_eq!(err.details().unwrap()["operation"], "resubmit");
    }

    #[test]
    fn storage_failure_is_500() {
        let err = AppError::from(IssuanceError::Corrupt("bad history".to_string()));
        assert_eq!(err.status_and_code(), (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"));
    }

    #[test]
    fn bad_request_is_422() {
        let err = AppError::BadRequest("missing field".to_string());
        assert_eq!(err.status_and_code(), (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"));
    }
}
