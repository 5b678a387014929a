//! # Submission Outcome State Machine
//!
//! ```text
//!               ┌──────────────┐
//!   Pending ──▶ │     Sent     │ ◀─┐ (Authority still processing)
//!     │  │      └──────────────┘ ──┘
//!     │  │         │ │ │ │
//!     │  │         ▼ ▼ ▼ ▼
//!     │  │   Accepted | AcceptedWithDiscrepancies | Rejected | NotFound
//!     │  ▼
//!     │ SubmissionFailed ──▶ Sent | Rejected | SubmissionFailed
//!     ▼
//!   Rejected (synchronous upload rejection)
//! ```
//!
//! Terminal states: `Accepted`, `AcceptedWithDiscrepancies`, `Rejected`,
//! `NotFound`. A terminal record refuses every further transition.
//!
//! `SubmissionFailed` is not terminal: the signed document and its folio
//! are kept so the document can be resubmitted without renumbering.
//!
//! Counterparty acceptance notices are recorded alongside the Authority
//! outcome and never move the state machine.

use chrono::{DateTime, Utc};
use dte_core::{AccountId, DocumentId, DocumentKind, Folio, TrackingId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a submitted document stands with the Authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    /// Signed and stored, not yet transmitted.
    Pending,
    /// Uploaded; the Authority returned a tracking id and is processing.
    Sent,
    /// Accepted by the Authority. Terminal.
    Accepted,
    /// Accepted with observations. Terminal.
    AcceptedWithDiscrepancies,
    /// Rejected by the Authority. Terminal.
    Rejected,
    /// The Authority has no record of the submission. Terminal.
    NotFound,
    /// Transmission failed after bounded retries; resubmittable.
    SubmissionFailed,
}

impl SubmissionState {
    /// Every state.
    pub const ALL: [SubmissionState; 7] = [
        Self::Pending,
        Self::Sent,
        Self::Accepted,
        Self::AcceptedWithDiscrepancies,
        Self::Rejected,
        Self::NotFound,
        Self::SubmissionFailed,
    ];

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::AcceptedWithDiscrepancies | Self::Rejected | Self::NotFound
        )
    }

    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Accepted => "ACCEPTED",
            Self::AcceptedWithDiscrepancies => "ACCEPTED_WITH_DISCREPANCIES",
            Self::Rejected => "REJECTED",
            Self::NotFound => "NOT_FOUND",
            Self::SubmissionFailed => "SUBMISSION_FAILED",
        }
    }

    /// Parse the canonical string name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == s)
    }

    /// Whether `self → to` is an allowed edge.
    ///
    /// No wildcard arm: a new state must be placed in the graph explicitly.
    pub fn can_transition_to(&self, to: SubmissionState) -> bool {
        use SubmissionState::*;
        match self {
            Pending => matches!(to, Sent | Rejected | SubmissionFailed),
            SubmissionFailed => matches!(to, Sent | Rejected | SubmissionFailed),
            Sent => matches!(
                to,
                Sent | Accepted | AcceptedWithDiscrepancies | Rejected | NotFound
            ),
            Accepted | AcceptedWithDiscrepancies | Rejected | NotFound => false,
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized Authority answer: the state it maps to, the raw code, and
/// the human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Normalized state.
    pub state: SubmissionState,
    /// The Authority's raw code.
    pub code: String,
    /// Human-readable detail.
    pub detail: String,
}

impl Outcome {
    /// Build an outcome.
    pub fn new(state: SubmissionState, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            state,
            code: code.into(),
            detail: detail.into(),
        }
    }
}

/// Counterparty's verdict on a received document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterpartyResponse {
    /// Accepted as issued.
    Accepted,
    /// Accepted with observations.
    AcceptedWithDiscrepancies,
    /// Rejected by the receiver.
    Rejected,
}

impl CounterpartyResponse {
    /// The canonical string name of this response.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::AcceptedWithDiscrepancies => "ACCEPTED_WITH_DISCREPANCIES",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parse the canonical string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCEPTED" => Some(Self::Accepted),
            "ACCEPTED_WITH_DISCREPANCIES" => Some(Self::AcceptedWithDiscrepancies),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A counterparty acceptance or rejection, as recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyNotice {
    /// The verdict.
    pub response: CounterpartyResponse,
    /// Raw acceptance code.
    pub code: String,
    /// Receiver's detail message.
    pub detail: String,
    /// When the notice was ingested.
    pub received_at: DateTime<Utc>,
}

/// One state change, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before.
    pub from: SubmissionState,
    /// State after.
    pub to: SubmissionState,
    /// When.
    pub at: DateTime<Utc>,
    /// Authority detail or local reason.
    pub detail: String,
}

/// Errors from the submission state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The edge is not in the graph.
    #[error("invalid submission transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: SubmissionState,
        /// Attempted target state.
        to: SubmissionState,
    },
    /// The record is terminal.
    #[error("submission {document_id} is in terminal state {state}")]
    AlreadyTerminal {
        /// Record identifier.
        document_id: DocumentId,
        /// The terminal state.
        state: SubmissionState,
    },
}

/// Submission tracking for one issued document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Document identifier.
    pub document_id: DocumentId,
    /// Issuing account.
    pub account: AccountId,
    /// Document kind.
    pub kind: DocumentKind,
    /// Folio, kept allocated whatever the outcome.
    pub folio: Folio,
    /// Signed XML as transmitted.
    pub signed_xml: String,
    /// Authority tracking id; shared by every record of a batch.
    pub tracking_id: Option<TrackingId>,
    /// Current state.
    pub state: SubmissionState,
    /// Latest Authority response code.
    pub authority_code: Option<String>,
    /// Latest Authority detail message.
    pub authority_message: Option<String>,
    /// Upload attempts made so far (across resubmissions).
    pub attempts: u32,
    /// When the Authority first acknowledged the upload.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When status was last checked.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Counterparty verdict, once received.
    pub counterparty: Option<CounterpartyNotice>,
    /// State changes, oldest first.
    pub history: Vec<TransitionRecord>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// A new `Pending` record for a freshly signed document.
    pub fn new(
        document_id: DocumentId,
        account: AccountId,
        kind: DocumentKind,
        folio: Folio,
        signed_xml: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            document_id,
            account,
            kind,
            folio,
            signed_xml,
            tracking_id: None,
            state: SubmissionState::Pending,
            authority_code: None,
            authority_message: None,
            attempts: 0,
            submitted_at: None,
            last_checked_at: None,
            counterparty: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `to`, recording `detail`.
    pub fn transition(
        &mut self,
        to: SubmissionState,
        detail: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                document_id: self.document_id,
                state: self.state,
            });
        }
        if !self.state.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        let detail = detail.into();
        self.history.push(TransitionRecord {
            from: self.state,
            to,
            at: now,
            detail: detail.clone(),
        });
        self.state = to;
        if !detail.is_empty() {
            self.authority_message = Some(detail);
        }
        self.updated_at = now;
        Ok(())
    }

    /// The upload was acknowledged with `tracking_id`.
    pub fn mark_sent(
        &mut self,
        tracking_id: TrackingId,
        detail: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(SubmissionState::Sent, detail, now)?;
        self.tracking_id = Some(tracking_id);
        self.submitted_at.get_or_insert(now);
        Ok(())
    }

    /// Apply a status query answer and stamp `last_checked_at`.
    ///
    /// Returns whether the state changed.
    pub fn apply_outcome(&mut self, outcome: &Outcome, now: DateTime<Utc>) -> Result<bool, TransitionError> {
        let before = self.state;
        self.transition(outcome.state, outcome.detail.clone(), now)?;
        self.authority_code = Some(outcome.code.clone());
        self.last_checked_at = Some(now);
        Ok(before != self.state)
    }

    /// Record a counterparty verdict.
    pub fn record_counterparty(&mut self, notice: CounterpartyNotice) {
        self.updated_at = notice.received_at;
        self.counterparty = Some(notice);
    }

    /// The current state as an outcome, for callers that do not need the
    /// network (terminal records).
    pub fn cached_outcome(&self) -> Outcome {
        let code = self
            .authority_code
            .clone()
            .unwrap_or_else(|| self.state.as_str().to_string());
        Outcome::new(
            self.state,
            code,
            self.authority_message.clone().unwrap_or_default(),
        )
    }
}
