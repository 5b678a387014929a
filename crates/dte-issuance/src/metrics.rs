//! # Issuance Metrics
//!
//! Prometheus counters for the issuance pipeline. The registry is owned by
//! [`IssuanceMetrics`]; the HTTP layer renders it on `/metrics`.

use std::sync::Arc;

use dte_core::{DocumentKind, ErrorKind};
use dte_state::SubmissionState;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct IssuanceMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    documents_issued: IntCounterVec,
    issue_failures: IntCounterVec,
    submission_outcomes: IntCounterVec,
    status_checks: IntCounterVec,
}

impl std::fmt::Debug for IssuanceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceMetrics").finish_non_exhaustive()
    }
}

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntCounterVec, prometheus::Error> {
    let vec = IntCounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

impl IssuanceMetrics {
    /// Create the counters in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let documents_issued = counter(
            &registry,
            "dte_documents_issued_total",
            "Documents numbered and signed",
            &["kind"],
        )?;
        let issue_failures = counter(
            &registry,
            "dte_issue_failures_total",
            "Issue requests that failed, by error kind",
            &["error_kind"],
        )?;
        let submission_outcomes = counter(
            &registry,
            "dte_submission_outcomes_total",
            "Submission state changes, by target state",
            &["state"],
        )?;
        let status_checks = counter(
            &registry,
            "dte_status_checks_total",
            "Status checks, by source (network, cached, failed)",
            &["source"],
        )?;
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                documents_issued,
                issue_failures,
                submission_outcomes,
                status_checks,
            }),
        })
    }

    pub fn document_issued(&self, kind: DocumentKind) {
        self.inner
            .documents_issued
            .with_label_values(&[&kind.code().to_string()])
            .inc();
    }

    pub fn issue_failed(&self, kind: ErrorKind) {
        self.inner
            .issue_failures
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn submission_state(&self, state: SubmissionState) {
        self.inner
            .submission_outcomes
            .with_label_values(&[state.as_str()])
            .inc();
    }

    pub fn status_check(&self, source: &str) {
        self.inner.status_checks.with_label_values(&[source]).inc();
    }

    /// Current value of one submission-state counter.
    pub fn submissions_in(&self, state: SubmissionState) -> u64 {
        self.inner
            .submission_outcomes
            .with_label_values(&[state.as_str()])
            .get()
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}
