//! # Folio Administration Routes
//!
//! - `GET  /v1/accounts/{account}/folios/{kind}/ranges`        — granted ranges
//! - `POST /v1/accounts/{account}/folios/{kind}/ranges`        — accept an Authority grant
//! - `GET  /v1/accounts/{account}/folios/{kind}/gaps`          — unissued folios between claims
//! - `POST /v1/accounts/{account}/folios/{kind}/{folio}/void`  — void an issued folio
//!
//! `{kind}` is the numeric Authority code (33, 39, 61, ...).

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dte_folio::{FolioGap, FolioRange};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{extract_json, parse_account, parse_folio, parse_kind};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/accounts/{account}/folios/{kind}/ranges",
            get(list_ranges).post(grant_range),
        )
        .route("/v1/accounts/{account}/folios/{kind}/gaps", get(list_gaps))
        .route("/v1/accounts/{account}/folios/{kind}/{folio}/void", post(void_folio))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GrantRequest {
    pub start: u64,
    pub end: u64,
    /// The grant document exactly as the Authority issued it.
    pub grant_xml: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoidRequest {
    pub reason: String,
}

async fn list_ranges(
    State(state): State<AppState>,
    Path((account, kind)): Path<(String, String)>,
) -> Result<Json<Vec<FolioRange>>, AppError> {
    let (account, kind) = (parse_account(&account)?, parse_kind(&kind)?);
    Ok(Json(state.service.folio_ranges(&account, kind).await?))
}

async fn grant_range(
    State(state): State<AppState>,
    Path((account, kind)): Path<(String, String)>,
    body: Result<Json<GrantRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FolioRange>), AppError> {
    let (account, kind) = (parse_account(&account)?, parse_kind(&kind)?);
    let request = extract_json(body)?;
    let range = state
        .service
        .grant_folio_range(&account, kind, request.start, request.end, &request.grant_xml)
        .await?;
    Ok((StatusCode::CREATED, Json(range)))
}

async fn list_gaps(
    State(state): State<AppState>,
    Path((account, kind)): Path<(String, String)>,
) -> Result<Json<Vec<FolioGap>>, AppError> {
    let (account, kind) = (parse_account(&account)?, parse_kind(&kind)?);
    Ok(Json(state.service.folio_gaps(&account, kind).await?))
}

async fn void_folio(
    State(state): State<AppState>,
    Path((account, kind, folio)): Path<(String, String, String)>,
    body: Result<Json<VoidRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let (account, kind, folio) = (parse_account(&account)?, parse_kind(&kind)?, parse_folio(&folio)?);
    let request = extract_json(body)?;
    state.service.void_folio(&account, kind, folio, &request.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}
