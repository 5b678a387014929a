//! # Transmitter
//!
//! Uploads signed documents to the Authority and queries their status.
//!
//! - The batch is sealed once, with a caller-supplied `SignedAt`, so every
//!   retry and every later resubmission of the same documents sends
//!   identical bytes and the Authority can deduplicate by fingerprint.
//! - The session is obtained once, before the first attempt. A handshake
//!   that fails there is surfaced with zero attempts; the negotiator has
//!   already spent its single retry.
//! - Transport failures (timeout, connection, 5xx) of the upload itself are
//!   retried up to `max_attempts` with exponential backoff. On exhaustion
//!   the caller gets a [`TransmitFailure`] and is expected to leave the
//!   documents in `SubmissionFailed`.
//! - A synchronous rejection is final: no tracking id, no retry.
//! - A refused or expired token is renegotiated within the attempt. If that
//!   renegotiation fails, the loop stops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dte_core::{AccountId, CanonicalXml, Clock, TrackingId};
use dte_crypto::CredentialStore;
use dte_state::{AuthoritySession, Outcome};
use tokio::sync::Mutex;

use crate::batch::SubmissionBatch;
use crate::client::AuthorityApi;
use crate::error::AuthorityError;
use crate::response::{StatusReport, UploadReceipt};
use crate::retry::{retry_transport, RetryPolicy};
use crate::session::SessionNegotiator;

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transmission {
    /// The Authority took the batch and returned a tracking id.
    Sent {
        tracking_id: TrackingId,
        outcome: Outcome,
        attempts: u32,
    },
    /// The Authority refused the batch synchronously.
    Rejected { outcome: Outcome, attempts: u32 },
}

impl Transmission {
    pub fn outcome(&self) -> &Outcome {
        match self {
            Self::Sent { outcome, .. } | Self::Rejected { outcome, .. } => outcome,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Sent { attempts, .. } | Self::Rejected { attempts, .. } => *attempts,
        }
    }
}

/// An upload that could not be completed.
#[derive(Debug, thiserror::Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct TransmitFailure {
    #[source]
    pub error: AuthorityError,
    /// Upload attempts made; zero when nothing was sent (unbuildable
    /// batch, missing credentials, failed handshake).
    pub attempts: u32,
}

impl TransmitFailure {
    fn before_upload(error: AuthorityError) -> Self {
        Self { error, attempts: 0 }
    }
}

/// Uploads batches and queries their status for any account.
pub struct Transmitter {
    api: Arc<dyn AuthorityApi>,
    sessions: Arc<SessionNegotiator>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transmitter")
            .field("sessions", &self.sessions)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Transmitter {
    pub fn new(
        api: Arc<dyn AuthorityApi>,
        sessions: Arc<SessionNegotiator>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            sessions,
            credentials,
            clock,
            policy,
        }
    }

    /// Upload a single signed document.
    pub async fn submit(
        &self,
        account: &AccountId,
        signed_xml: &str,
        signed_at: DateTime<Utc>,
    ) -> Result<Transmission, TransmitFailure> {
        self.submit_batch(account, &[signed_xml], signed_at).await
    }

    /// Upload several signed documents of one account under one cover sheet.
    ///
    /// `signed_at` goes on the cover sheet. Passing the same value for the
    /// same documents reproduces the same bytes.
    pub async fn submit_batch(
        &self,
        account: &AccountId,
        signed_documents: &[&str],
        signed_at: DateTime<Utc>,
    ) -> Result<Transmission, TransmitFailure> {
        let mut batch = SubmissionBatch::new();
        for signed in signed_documents {
            batch.push_signed(signed).map_err(TransmitFailure::before_upload)?;
        }
        let material = self
            .credentials
            .load(account)
            .map_err(|e| TransmitFailure::before_upload(e.into()))?;
        let sealed = batch.seal(&material, signed_at).map_err(TransmitFailure::before_upload)?;

        let session = self.sessions.get_session(account).await.map_err(|error| {
            tracing::error!(account = %account, error = %error, "no authority session, nothing uploaded");
            TransmitFailure::before_upload(error)
        })?;
        let session = Mutex::new(session);

        let payload = &sealed;
        let session = &session;
        let retried = retry_transport(self.policy, "upload", move |attempt| async move {
            self.upload_once(account, payload, session, attempt).await
        })
        .await;
        let attempts = retried.attempts;
        let receipt = retried.result.and_then(|renegotiated| renegotiated).map_err(|error| {
            tracing::error!(
                account = %account,
                documents = batch.len(),
                attempts,
                error = %error,
                "upload failed"
            );
            TransmitFailure { error, attempts }
        })?;

        match receipt.tracking_id {
            Some(tracking_id) => {
                tracing::info!(
                    account = %account,
                    tracking_id = %tracking_id,
                    documents = batch.len(),
                    attempts,
                    "batch sent"
                );
                Ok(Transmission::Sent {
                    tracking_id,
                    outcome: receipt.outcome,
                    attempts,
                })
            }
            None => {
                tracing::warn!(
                    account = %account,
                    code = %receipt.outcome.code,
                    detail = %receipt.outcome.detail,
                    "batch rejected"
                );
                Ok(Transmission::Rejected {
                    outcome: receipt.outcome,
                    attempts,
                })
            }
        }
    }

    /// One upload attempt with the held session.
    ///
    /// The outer error is the upload's own failure and is retried by kind.
    /// The inner error is a failed renegotiation and ends the loop.
    async fn upload_once(
        &self,
        account: &AccountId,
        payload: &CanonicalXml,
        session: &Mutex<AuthoritySession>,
        attempt: u32,
    ) -> Result<Result<UploadReceipt, AuthorityError>, AuthorityError> {
        tracing::debug!(account = %account, attempt, bytes = payload.len(), "uploading batch");
        let mut held = session.lock().await;
        if !held.is_active_at(self.clock.now()) {
            match self.sessions.get_session(account).await {
                Ok(fresh) => *held = fresh,
                Err(e) => return Ok(Err(e)),
            }
        }
        match self.api.upload(held.token(), payload).await {
            Err(AuthorityError::Unauthorized { .. }) => {
                self.sessions.invalidate(account).await;
                match self.sessions.get_session(account).await {
                    Ok(fresh) => *held = fresh,
                    Err(e) => return Ok(Err(e)),
                }
                self.api.upload(held.token(), payload).await.map(Ok)
            }
            other => other.map(Ok),
        }
    }

    /// One status query for `tracking_id`. Not retried: a failed query
    /// leaves the caller's cached outcome in place until the next poll.
    pub async fn query_status(
        &self,
        account: &AccountId,
        tracking_id: &TrackingId,
    ) -> Result<StatusReport, AuthorityError> {
        let session = self.sessions.get_session(account).await?;
        let report = match self.api.query_status(session.token(), tracking_id).await {
            Err(AuthorityError::Unauthorized { .. }) => {
                self.sessions.invalidate(account).await;
                let session = self.sessions.get_session(account).await?;
                self.api.query_status(session.token(), tracking_id).await?
            }
            other => other?,
        };
        tracing::debug!(
            account = %account,
            tracking_id = %tracking_id,
            code = %report.batch.code,
            documents = report.documents.len(),
            "status queried"
        );
        Ok(report)
    }
}
