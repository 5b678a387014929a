//! # Status Reconciler
//!
//! Brings stored submission records in line with what the Authority
//! reports for their tracking ids.
//!
//! - A terminal record is answered from the store; the network is only
//!   consulted when the caller forces it, and even then the record does
//!   not move.
//! - A record without a tracking id (`Pending`, `SubmissionFailed`) has
//!   nothing to ask the Authority about; its cached outcome is returned.
//! - One status query answers a whole batch: every non-terminal record
//!   sharing the tracking id takes its own document entry, or the
//!   batch-level outcome when the Authority gives none.
//! - A failed query leaves every record untouched.
//!
//! Repeated "still processing" answers only stamp `last_checked_at`; the
//! transition history grows only when the state or the code changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dte_authority::{StatusReport, Transmitter};
use dte_core::{AccountId, Clock, DocumentId, TrackingId};
use dte_state::{Outcome, SubmissionRecord, SubmissionState, TransitionError};

use crate::error::IssuanceError;
use crate::metrics::IssuanceMetrics;
use crate::store::SubmissionStore;

/// Status reconciliation over a [`SubmissionStore`].
pub struct StatusReconciler {
    store: Arc<dyn SubmissionStore>,
    transmitter: Arc<Transmitter>,
    clock: Arc<dyn Clock>,
    metrics: IssuanceMetrics,
}

impl std::fmt::Debug for StatusReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReconciler")
            .field("transmitter", &self.transmitter)
            .finish_non_exhaustive()
    }
}

impl StatusReconciler {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        transmitter: Arc<Transmitter>,
        clock: Arc<dyn Clock>,
        metrics: IssuanceMetrics,
    ) -> Self {
        Self {
            store,
            transmitter,
            clock,
            metrics,
        }
    }

    /// Current outcome of one document.
    ///
    /// With `force`, a terminal record is re-queried and the fresh answer
    /// returned, but the stored record keeps its terminal state.
    pub async fn check_status(&self, document_id: DocumentId, force: bool) -> Result<Outcome, IssuanceError> {
        let record = self
            .store
            .get(document_id)
            .await?
            .ok_or(IssuanceError::UnknownDocument(document_id))?;

        if record.state.is_terminal() && !force {
            self.metrics.status_check("cached");
            return Ok(record.cached_outcome());
        }
        let Some(tracking_id) = record.tracking_id.clone() else {
            self.metrics.status_check("cached");
            return Ok(record.cached_outcome());
        };

        let report = self.query(&record.account, &tracking_id).await?;
        self.apply_report(&report).await?;
        Ok(report.outcome_for(record.kind, record.folio))
    }

    /// Query every tracking id with an in-flight (`Sent`) record once.
    ///
    /// Returns how many tracking ids were answered. A failure for one
    /// tracking id is logged and does not stop the others.
    pub async fn poll_in_flight(&self) -> Result<usize, IssuanceError> {
        let in_flight = self.store.list_in_state(SubmissionState::Sent).await?;
        let mut by_tracking: BTreeMap<String, (TrackingId, AccountId)> = BTreeMap::new();
        for record in in_flight {
            if let Some(tracking_id) = record.tracking_id {
                by_tracking
                    .entry(tracking_id.as_str().to_string())
                    .or_insert((tracking_id, record.account));
            }
        }

        let mut answered = 0;
        for (tracking_id, account) in by_tracking.into_values() {
            match self.query(&account, &tracking_id).await {
                Ok(report) => {
                    self.apply_report(&report).await?;
                    answered += 1;
                }
                Err(e) => tracing::warn!(
                    account = %account,
                    tracking_id = %tracking_id,
                    error = %e,
                    "status poll failed; cached outcomes kept"
                ),
            }
        }
        Ok(answered)
    }

    async fn query(&self, account: &AccountId, tracking_id: &TrackingId) -> Result<StatusReport, IssuanceError> {
        match self.transmitter.query_status(account, tracking_id).await {
            Ok(report) => {
                self.metrics.status_check("network");
                Ok(report)
            }
            Err(e) => {
                self.metrics.status_check("failed");
                Err(e.into())
            }
        }
    }

    /// Apply one report to every record sharing its tracking id.
    async fn apply_report(&self, report: &StatusReport) -> Result<(), IssuanceError> {
        let now = self.clock.now();
        for mut record in self.store.find_by_tracking(&report.tracking_id).await? {
            if record.state.is_terminal() {
                continue;
            }
            let outcome = report.outcome_for(record.kind, record.folio);
            match apply(&mut record, &outcome, now) {
                Ok(changed) => {
                    if changed {
                        self.metrics.submission_state(record.state);
                        tracing::info!(
                            account = %record.account,
                            kind = %record.kind,
                            folio = %record.folio,
                            tracking_id = %report.tracking_id,
                            state = %record.state,
                            code = %outcome.code,
                            "submission state changed"
                        );
                    }
                    self.store.update(&record).await?;
                }
                Err(e) => tracing::error!(
                    document_id = %record.document_id,
                    tracking_id = %report.tracking_id,
                    error = %e,
                    "status report does not fit the record"
                ),
            }
        }
        Ok(())
    }
}

/// Apply `outcome`, or only stamp the check time when nothing changed.
/// Returns whether the state changed.
fn apply(record: &mut SubmissionRecord, outcome: &Outcome, now: DateTime<Utc>) -> Result<bool, TransitionError> {
    if record.state == outcome.state && record.authority_code.as_deref() == Some(outcome.code.as_str()) {
        record.last_checked_at = Some(now);
        record.updated_at = now;
        return Ok(false);
    }
    record.apply_outcome(outcome, now)
}
