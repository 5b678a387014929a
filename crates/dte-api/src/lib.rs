//! # dte-api — HTTP Surface for the DTE Stack
//!
//! Exposes [`dte_issuance::IssuanceService`] to the business layer over
//! JSON. Every refusal carries a machine-readable code derived from the
//! error kind; see [`error`] for the status table.
//!
//! ## API Surface
//!
//! | Prefix | Module | Operations |
//! |--------|--------|------------|
//! | `/v1/accounts/{account}/documents` | [`routes::documents`] | issue |
//! | `/v1/documents/*`, `/v1/batches` | [`routes::documents`] | record, status, resubmit, batch |
//! | `/v1/accounts/{account}/folios/*` | [`routes::folios`] | ranges, grants, gaps, voids |
//! | `/v1/notices` | [`routes::notices`] | counterparty acceptance notices |
//!
//! Health checks and `/metrics` are mounted beside the API routes.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let metrics = state.http_metrics.clone();

    // Signed batches stay well under 2 MiB; larger bodies are refused.
    let api = Router::new()
        .merge(routes::documents::router())
        .merge(routes::folios::router())
        .merge(routes::notices::router())
        .route_layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(Extension(metrics));

    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness() -> &'static str {
    "ready"
}

/// GET /metrics — issuance counters followed by HTTP request metrics, in
/// Prometheus text exposition format.
async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let mut body = state.service.metrics().gather_and_encode().map_err(AppError::Internal)?;
    body.push_str(&state.http_metrics.gather_and_encode().map_err(AppError::Internal)?);
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
