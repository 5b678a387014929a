//! # Counterparty Notice Route
//!
//! `POST /v1/notices` takes a receiver's acceptance notice as an XML body
//! and records it on the matching submission.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use dte_state::SubmissionRecord;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/notices", post(ingest_notice))
}

async fn ingest_notice(State(state): State<AppState>, body: String) -> Result<Json<SubmissionRecord>, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::Validation("notice body is empty".to_string()));
    }
    Ok(Json(state.service.ingest_acceptance_notice(&body).await?))
}
