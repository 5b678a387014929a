//! # Document Routes
//!
//! - `POST /v1/accounts/{account}/documents` — issue a draft
//! - `GET  /v1/documents/{id}`               — stored submission record
//! - `GET  /v1/documents/{id}/status`        — reconcile with the Authority (`?force=true` re-asks for terminal records)
//! - `POST /v1/documents/{id}/resubmit`      — send a failed document again
//! - `POST /v1/batches`                      — send several documents under one cover sheet

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dte_core::DocumentId;
use dte_document::DocumentDraft;
use dte_issuance::IssuedDocument;
use dte_state::{Outcome, SubmissionRecord};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{extract_json, parse_account, parse_document_id};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/accounts/{account}/documents", post(issue_document))
        .route("/v1/documents/{id}", get(get_document))
        .route("/v1/documents/{id}/status", get(document_status))
        .route("/v1/documents/{id}/resubmit", post(resubmit_document))
        .route("/v1/batches", post(submit_batch))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    pub document_ids: Vec<DocumentId>,
}

async fn issue_document(
    State(state): State<AppState>,
    Path(account): Path<String>,
    body: Result<Json<DocumentDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedDocument>), AppError> {
    let account = parse_account(&account)?;
    let draft = extract_json(body)?;
    let issued = state.service.issue(&account, &draft).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionRecord>, AppError> {
    let id = parse_document_id(&id)?;
    Ok(Json(state.service.get_submission(id).await?))
}

async fn document_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Outcome>, AppError> {
    let id = parse_document_id(&id)?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(state.service.check_status(id, query.force).await?))
}

async fn resubmit_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionRecord>, AppError> {
    let id = parse_document_id(&id)?;
    Ok(Json(state.service.resubmit(id).await?))
}

async fn submit_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<Vec<SubmissionRecord>>, AppError> {
    let request = extract_json(body)?;
    Ok(Json(state.service.submit_batch(&request.document_ids).await?))
}
