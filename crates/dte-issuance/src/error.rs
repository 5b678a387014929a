//! # Issuance Error Types
//!
//! [`IssuanceError`] is what the business layer sees. It wraps every lower
//! crate's error, keeps their [`ErrorKind`], and carries the Authority's
//! detail message when one exists.

use dte_authority::{AuthorityError, ConfigError};
use dte_core::{AccountId, DocumentId, DocumentKind, ErrorKind, Folio, TaxId};
use dte_crypto::CryptoError;
use dte_document::DocumentError;
use dte_folio::FolioError;
use dte_state::{SubmissionState, TransitionError};
use thiserror::Error;

/// Top-level error for issuance operations.
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// The draft failed structural validation.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Allocation, reservation, voiding, or range grant failed.
    #[error(transparent)]
    Folio(#[from] FolioError),

    /// Credential material is missing or unusable.
    #[error(transparent)]
    Credential(#[from] CryptoError),

    /// Authority call failed outside of an upload (status query, notice).
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Upload retries were exhausted. The folio stays allocated and the
    /// document stays stored in `SubmissionFailed` for resubmission.
    #[error("submission of document {document_id} (kind {kind}, folio {folio}) failed after {attempts} attempt(s): {source}")]
    SubmissionFailed {
        document_id: DocumentId,
        kind: DocumentKind,
        folio: Folio,
        attempts: u32,
        #[source]
        source: AuthorityError,
    },

    /// The upload failed for a reason retrying will not fix (unrecognized
    /// or malformed answer, refused credentials), or nothing was sent
    /// because no session could be established. The record keeps its state
    /// and its folio; the kind is that of `source`.
    #[error("document {document_id} (kind {kind}, folio {folio}) not delivered after {attempts} attempt(s): {source}")]
    NotDelivered {
        document_id: DocumentId,
        kind: DocumentKind,
        folio: Folio,
        attempts: u32,
        #[source]
        source: AuthorityError,
    },

    /// The configured sender does not hold the account's certificate.
    #[error("account {account} signs as {holder}, configured sender is {configured}")]
    SenderMismatch {
        account: AccountId,
        configured: TaxId,
        holder: TaxId,
    },

    /// The Authority refused the upload synchronously.
    #[error("document {document_id} rejected by the authority ({code}): {detail}")]
    Rejected {
        document_id: DocumentId,
        code: String,
        detail: String,
    },

    /// No submission record with this id.
    #[error("document {0} not found")]
    UnknownDocument(DocumentId),

    /// No submission record matches a counterparty notice.
    #[error("no document for kind {kind} folio {folio}")]
    UnmatchedNotice { kind: DocumentKind, folio: Folio },

    /// The record is not in a state the operation accepts.
    #[error("document {document_id} is {state}; {operation} is not allowed")]
    InvalidState {
        document_id: DocumentId,
        state: SubmissionState,
        operation: &'static str,
    },

    /// Submission state machine refused a transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Request is well-formed but inconsistent (mixed-account batch, blank void reason).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Submission persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Stored data could not be decoded.
    #[error("corrupt stored record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IssuanceError {
    /// Machine-readable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Document(e) => e.kind(),
            Self::Folio(e) => e.kind(),
            Self::Credential(e) => e.kind(),
            Self::Authority(e) | Self::NotDelivered { source: e, .. } => e.kind(),
            Self::SenderMismatch { .. } => ErrorKind::Credential,
            Self::SubmissionFailed { .. } => ErrorKind::Transport,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::UnknownDocument(_) | Self::UnmatchedNotice { .. } => ErrorKind::NotFound,
            Self::InvalidState { .. } | Self::Transition(_) => ErrorKind::ConcurrencyConflict,
            Self::InvalidRequest(_) | Self::Config(_) => ErrorKind::Validation,
            Self::Storage(_) | Self::Corrupt(_) => ErrorKind::Storage,
        }
    }

    /// The Authority's raw detail message, when the failure came from it.
    pub fn authority_detail(&self) -> Option<&str> {
        match self {
            Self::Rejected { detail, .. } => Some(detail),
            Self::Authority(e) | Self::SubmissionFailed { source: e, .. } | Self::NotDelivered { source: e, .. } => {
                e.authority_detail().or_else(|| e.raw_payload())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_failure_is_transport_and_names_folio() {
        let err = IssuanceError::SubmissionFailed {
            document_id: DocumentId::new(),
            kind: DocumentKind::Invoice,
            folio: Folio::new(100).unwrap(),
            attempts: 3,
            source: AuthorityError::Timeout {
                endpoint: "upload".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        let msg = err.to_string();
        assert!(msg.contains("folio 100"));
        assert!(msg.contains("3 attempt(s)"));
    }

    #[test]
    fn undelivered_upload_keeps_the_authority_kind() {
        let err = IssuanceError::NotDelivered {
            document_id: DocumentId::new(),
            kind: DocumentKind::Invoice,
            folio: Folio::new(100).unwrap(),
            attempts: 1,
            source: AuthorityError::UnknownCode {
                family: "upload",
                code: "4".into(),
                payload: "<UploadAck><Status>4</Status></UploadAck>".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.authority_detail(), Some("<UploadAck><Status>4</Status></UploadAck>"));
    }

    #[test]
    fn kinds_pass_through() {
        let err: IssuanceError = FolioError::FolioInUse { folio: 7 }.into();
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);
        let err: IssuanceError = DocumentError::NoLineItems.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rejection_carries_authority_detail() {
        let err = IssuanceError::Rejected {
            document_id: DocumentId::new(),
            code: "2".into(),
            detail: "signature error".into(),
        };
        assert_eq!(err.authority_detail(), Some("signature error"));
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }
}
