//! # HTTP Request Metrics
//!
//! Per-route request counters and latency histograms. Routes are labelled
//! by their matched template (`/v1/documents/{id}`) so account slugs,
//! folios, and document ids never become label values.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// HTTP metrics backed by their own Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics").finish_non_exhaustive()
    }
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let requests = IntCounterVec::new(
            Opts::new("dte_http_requests_total", "HTTP requests by route and status"),
            &["method", "route", "status"],
        )?;
        registry.register(Box::new(requests.clone()))?;
        let duration = HistogramVec::new(
            HistogramOpts::new("dte_http_request_duration_seconds", "HTTP request latency"),
            &["method", "route"],
        )?;
        registry.register(Box::new(duration.clone()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                requests,
                duration,
            }),
        })
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16, seconds: f64) {
        self.inner
            .requests
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.inner.duration.with_label_values(&[method, route]).observe(seconds);
    }

    /// Requests recorded so far, across every label.
    pub fn requests(&self) -> u64 {
        self.inner
            .registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "dte_http_requests_total")
            .flat_map(|family| family.get_metric())
            .map(|m| m.get_counter().get_value() as u64)
            .sum()
    }

    pub fn gather_and_encode(&self) -> Result<String, String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

/// Record method, matched route, status, and latency of each request.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(&method, &route, response.status().as_u16(), start.elapsed().as_secs_f64());
    }
    response
}
