//! # Extractors
//!
//! Helpers that turn path segments and JSON bodies into domain values,
//! mapping every failure to a 422 [`AppError`] instead of axum's default
//! plain-text rejections.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use dte_core::{AccountId, DocumentId, DocumentKind, Folio};

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

pub fn parse_account(raw: &str) -> Result<AccountId, AppError> {
    Ok(AccountId::new(raw)?)
}

/// Document kinds are addressed by their numeric Authority code.
pub fn parse_kind(raw: &str) -> Result<DocumentKind, AppError> {
    let code: u16 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("document kind must be a numeric code, got {raw:?}")))?;
    Ok(DocumentKind::from_code(code)?)
}

pub fn parse_folio(raw: &str) -> Result<Folio, AppError> {
    let value: u64 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("folio must be a positive integer, got {raw:?}")))?;
    Ok(Folio::new(value)?)
}

pub fn parse_document_id(raw: &str) -> Result<DocumentId, AppError> {
    raw.parse()
        .map_err(|e| AppError::Validation(format!("invalid document id {raw:?}: {e}")))
}
