//! # Issuance Service
//!
//! The single entry point the business layer calls. [`IssuanceService::issue`]
//! composes the pipeline:
//!
//! ```text
//! validate draft ─▶ load credentials ─▶ allocate folio ─▶ canonicalize ─▶ sign
//!        │                 │                  │                            │
//!   Validation        Credential      RangeExhausted              (folio voided)
//!                                                                          ▼
//!                                         store record (Pending) ─▶ transmit
//!                                                                          │
//!                             Sent │ Rejected │ SubmissionFailed │ NotDelivered
//! ```
//!
//! Everything that can refuse the document without the Authority runs
//! before a folio is taken. Once a folio is allocated it is never handed
//! back: a signing failure voids it, a transport failure keeps it with the
//! stored document so [`IssuanceService::resubmit`] can send the same
//! bytes again. Only transport failures move a record to
//! `SubmissionFailed`; a protocol or credential failure leaves it where it
//! was and surfaces with its own kind.

use std::collections::BTreeSet;
use std::sync::Arc;

use dte_authority::{
    parse_acceptance, AuthorityApi, AuthorityConfig, RetryPolicy, SessionNegotiator, TransmitFailure, Transmission,
    Transmitter,
};
use dte_core::{AccountId, Clock, DocumentId, DocumentKind, Folio, TaxId, TrackingId, XmlElement};
use dte_crypto::{CredentialStore, KeyMaterial};
use dte_document::{canonicalize, sign_document, DocumentDraft, DocumentSummary, Totals};
use dte_folio::{
    find_gaps, FolioError, FolioGap, FolioRange, FolioStore, GrantProof, MemoryFolioStore, PgFolioStore, RangeGrant,
};
use dte_state::{CounterpartyNotice, Outcome, SubmissionRecord, SubmissionState};
use serde::Serialize;
use sqlx::PgPool;

use crate::config::IssuanceConfig;
use crate::error::IssuanceError;
use crate::metrics::IssuanceMetrics;
use crate::pg::PgSubmissionStore;
use crate::reconciler::StatusReconciler;
use crate::store::{MemorySubmissionStore, SubmissionStore};

/// The persistent collaborators of the service.
#[derive(Clone)]
pub struct IssuanceStores {
    pub folios: Arc<dyn FolioStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl IssuanceStores {
    /// In-memory folio and submission stores around `credentials`.
    pub fn in_memory(credentials: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            folios: Arc::new(MemoryFolioStore::with_clock(clock)),
            submissions: Arc::new(MemorySubmissionStore::new()),
            credentials,
        }
    }

    /// Postgres-backed folio and submission stores on one pool.
    pub fn postgres(pool: PgPool, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            folios: Arc::new(PgFolioStore::new(pool.clone())),
            submissions: Arc::new(PgSubmissionStore::new(pool)),
            credentials,
        }
    }
}

/// What `issue` hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedDocument {
    pub document_id: DocumentId,
    pub kind: DocumentKind,
    pub folio: Folio,
    pub totals: Totals,
    /// The signed `<TaxDocument>` as transmitted.
    pub signed_xml: String,
    pub tracking_id: Option<TrackingId>,
    pub state: SubmissionState,
}

/// Issuance, status, and folio administration for every account.
pub struct IssuanceService {
    folios: Arc<dyn FolioStore>,
    submissions: Arc<dyn SubmissionStore>,
    credentials: Arc<dyn CredentialStore>,
    transmitter: Arc<Transmitter>,
    reconciler: StatusReconciler,
    clock: Arc<dyn Clock>,
    config: IssuanceConfig,
    metrics: IssuanceMetrics,
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService")
            .field("credentials", &self.credentials.store_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IssuanceService {
    /// Wire the pipeline. The session negotiator and transmitter are built
    /// here from `authority`, so every retry and timeout setting comes from
    /// one place.
    pub fn new(
        stores: IssuanceStores,
        api: Arc<dyn AuthorityApi>,
        authority: &AuthorityConfig,
        config: IssuanceConfig,
        clock: Arc<dyn Clock>,
        metrics: IssuanceMetrics,
    ) -> Self {
        let sessions = Arc::new(SessionNegotiator::new(
            api.clone(),
            stores.credentials.clone(),
            clock.clone(),
            authority.default_token_lifetime_secs,
        ));
        let transmitter = Arc::new(Transmitter::new(
            api,
            sessions,
            stores.credentials.clone(),
            clock.clone(),
            RetryPolicy::from_config(authority),
        ));
        let reconciler = StatusReconciler::new(
            stores.submissions.clone(),
            transmitter.clone(),
            clock.clone(),
            metrics.clone(),
        );
        Self {
            folios: stores.folios,
            submissions: stores.submissions,
            credentials: stores.credentials,
            transmitter,
            reconciler,
            clock,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &IssuanceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &IssuanceMetrics {
        &self.metrics
    }

    // ─── Issuance ───────────────────────────────────────────────────────

    /// Number, sign, store, and transmit one document.
    ///
    /// A synchronous rejection is returned as [`IssuanceError::Rejected`]
    /// and exhausted transport retries as [`IssuanceError::SubmissionFailed`];
    /// in both cases the document is stored and keeps its folio.
    pub async fn issue(&self, account: &AccountId, draft: &DocumentDraft) -> Result<IssuedDocument, IssuanceError> {
        let result = self.issue_inner(account, draft).await;
        match &result {
            Ok(issued) => self.metrics.document_issued(issued.kind),
            Err(e) => self.metrics.issue_failed(e.kind()),
        }
        result
    }

    async fn issue_inner(&self, account: &AccountId, draft: &DocumentDraft) -> Result<IssuedDocument, IssuanceError> {
        let rate = self.config.tax_rate;
        draft.validate(rate)?;
        let material = self.credentials.load(account)?;
        material.ensure_valid_on(draft.issue_date)?;
        self.check_sender(account, &material)?;

        let folio = self.folios.allocate(account, draft.kind).await?;
        tracing::info!(account = %account, kind = %draft.kind, folio = %folio, "folio allocated");

        let signed = match canonicalize(account, draft, folio, rate).and_then(|env| sign_document(env, &material)) {
            Ok(signed) => signed,
            Err(e) => {
                self.void_after_failure(account, draft.kind, folio, &format!("signing failed: {e}"))
                    .await;
                return Err(e.into());
            }
        };
        let totals = signed.envelope().totals;
        let record = SubmissionRecord::new(
            DocumentId::new(),
            account.clone(),
            draft.kind,
            folio,
            signed.signed_xml().as_str().to_string(),
            self.clock.now(),
        );
        if let Err(e) = self.submissions.insert(&record).await {
            self.void_after_failure(account, draft.kind, folio, &format!("storing signed document failed: {e}"))
                .await;
            return Err(e);
        }
        self.metrics.submission_state(SubmissionState::Pending);

        let mut records = self.deliver(vec![record]).await?;
        let record = records.remove(0);
        Ok(IssuedDocument {
            document_id: record.document_id,
            kind: record.kind,
            folio: record.folio,
            totals,
            signed_xml: record.signed_xml,
            tracking_id: record.tracking_id,
            state: record.state,
        })
    }

    /// A configured sender must be the holder of the account's certificate:
    /// the cover sheet names the holder and the Authority checks it against
    /// the submitting taxpayer.
    fn check_sender(&self, account: &AccountId, material: &KeyMaterial) -> Result<(), IssuanceError> {
        let Some(sender) = &self.config.sender_tax_id else {
            return Ok(());
        };
        let holder = material.certificate().subject_tax_id();
        if holder != sender {
            return Err(IssuanceError::SenderMismatch {
                account: account.clone(),
                configured: sender.clone(),
                holder: holder.clone(),
            });
        }
        Ok(())
    }

    async fn void_after_failure(&self, account: &AccountId, kind: DocumentKind, folio: Folio, reason: &str) {
        tracing::error!(account = %account, kind = %kind, folio = %folio, reason, "voiding folio after failure");
        if let Err(e) = self.folios.release(account, kind, folio, reason).await {
            tracing::error!(account = %account, kind = %kind, folio = %folio, error = %e, "void failed");
        }
    }

    /// Upload `records` (one account) as one batch and store the result.
    ///
    /// All records share one fate: one tracking id, one rejection, one
    /// transport failure, or one undelivered error. Errors name the first
    /// record.
    ///
    /// The cover sheet is dated with the latest creation time of the
    /// records, so resubmitting the same documents sends the same bytes.
    async fn deliver(&self, mut records: Vec<SubmissionRecord>) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        let Some(first) = records.first() else {
            return Err(IssuanceError::InvalidRequest("nothing to submit".to_string()));
        };
        let account = first.account.clone();
        let (first_id, first_kind, first_folio) = (first.document_id, first.kind, first.folio);
        let signed_at = records.iter().map(|r| r.created_at).fold(first.created_at, std::cmp::max);
        let material = self.credentials.load(&account)?;
        self.check_sender(&account, &material)?;

        let documents: Vec<&str> = records.iter().map(|r| r.signed_xml.as_str()).collect();
        let result = self.transmitter.submit_batch(&account, &documents, signed_at).await;
        let now = self.clock.now();

        match result {
            Ok(Transmission::Sent {
                tracking_id,
                outcome,
                attempts,
            }) => {
                for record in records.iter_mut() {
                    record.attempts += attempts;
                    record.mark_sent(tracking_id.clone(), outcome.detail.clone(), now)?;
                    record.authority_code = Some(outcome.code.clone());
                    self.submissions.update(record).await?;
                    self.metrics.submission_state(SubmissionState::Sent);
                }
                Ok(records)
            }
            Ok(Transmission::Rejected { outcome, attempts }) => {
                for record in records.iter_mut() {
                    record.attempts += attempts;
                    record.transition(SubmissionState::Rejected, outcome.detail.clone(), now)?;
                    record.authority_code = Some(outcome.code.clone());
                    self.submissions.update(record).await?;
                    self.metrics.submission_state(SubmissionState::Rejected);
                }
                Err(IssuanceError::Rejected {
                    document_id: first_id,
                    code: outcome.code,
                    detail: outcome.detail,
                })
            }
            Err(TransmitFailure { error, attempts }) if attempts == 0 || !error.kind().is_retryable() => {
                if let Some(payload) = error.raw_payload() {
                    tracing::error!(
                        account = %account,
                        folio = %first_folio,
                        kind = error.kind().as_str(),
                        payload,
                        "authority answered the upload with an unusable response"
                    );
                }
                if attempts > 0 {
                    for record in records.iter_mut() {
                        record.attempts += attempts;
                        record.updated_at = now;
                        self.submissions.update(record).await?;
                    }
                }
                Err(IssuanceError::NotDelivered {
                    document_id: first_id,
                    kind: first_kind,
                    folio: first_folio,
                    attempts,
                    source: error,
                })
            }
            Err(TransmitFailure { error, attempts }) => {
                for record in records.iter_mut() {
                    record.attempts += attempts;
                    record.transition(SubmissionState::SubmissionFailed, error.to_string(), now)?;
                    self.submissions.update(record).await?;
                    self.metrics.submission_state(SubmissionState::SubmissionFailed);
                }
                Err(IssuanceError::SubmissionFailed {
                    document_id: first_id,
                    kind: first_kind,
                    folio: first_folio,
                    attempts,
                    source: error,
                })
            }
        }
    }

    /// Transmit a stored `Pending` or `SubmissionFailed` document again,
    /// with the same folio and the same signed bytes.
    pub async fn resubmit(&self, document_id: DocumentId) -> Result<SubmissionRecord, IssuanceError> {
        let record = self.submittable(document_id, "resubmit").await?;
        tracing::info!(
            account = %record.account,
            kind = %record.kind,
            folio = %record.folio,
            attempts = record.attempts,
            "resubmitting"
        );
        let mut records = self.deliver(vec![record]).await?;
        Ok(records.remove(0))
    }

    /// Transmit several stored documents of one account under one cover
    /// sheet. Every record receives the batch's tracking id.
    pub async fn submit_batch(&self, document_ids: &[DocumentId]) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        if document_ids.is_empty() {
            return Err(IssuanceError::InvalidRequest("batch is empty".to_string()));
        }
        let unique: BTreeSet<_> = document_ids.iter().collect();
        if unique.len() != document_ids.len() {
            return Err(IssuanceError::InvalidRequest("batch lists a document twice".to_string()));
        }
        let mut records = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            records.push(self.submittable(*id, "batch submission").await?);
        }
        let account = &records[0].account;
        if let Some(other) = records.iter().find(|r| &r.account != account) {
            return Err(IssuanceError::InvalidRequest(format!(
                "batch mixes accounts {account} and {}",
                other.account
            )));
        }
        self.deliver(records).await
    }

    async fn submittable(&self, document_id: DocumentId, operation: &'static str) -> Result<SubmissionRecord, IssuanceError> {
        let record = self.get_submission(document_id).await?;
        match record.state {
            SubmissionState::Pending | SubmissionState::SubmissionFailed => Ok(record),
            state => Err(IssuanceError::InvalidState {
                document_id,
                state,
                operation,
            }),
        }
    }

    // ─── Status ─────────────────────────────────────────────────────────

    /// Current outcome of a document; see [`StatusReconciler::check_status`].
    pub async fn check_status(&self, document_id: DocumentId, force: bool) -> Result<Outcome, IssuanceError> {
        self.reconciler.check_status(document_id, force).await
    }

    /// One status query per in-flight tracking id.
    pub async fn poll_in_flight(&self) -> Result<usize, IssuanceError> {
        self.reconciler.poll_in_flight().await
    }

    pub async fn get_submission(&self, document_id: DocumentId) -> Result<SubmissionRecord, IssuanceError> {
        self.submissions
            .get(document_id)
            .await?
            .ok_or(IssuanceError::UnknownDocument(document_id))
    }

    /// Record a counterparty's acceptance or rejection.
    ///
    /// The notice is matched on kind, folio, and issuer tax id. It never
    /// changes the Authority outcome of the record.
    pub async fn ingest_acceptance_notice(&self, xml: &str) -> Result<SubmissionRecord, IssuanceError> {
        let notice = parse_acceptance(xml)?;
        let candidates = self.submissions.find_by_folio(notice.kind, notice.folio).await?;
        let mut record = candidates
            .into_iter()
            .find(|r| issuer_of(r).as_ref() == Some(&notice.issuer))
            .ok_or(IssuanceError::UnmatchedNotice {
                kind: notice.kind,
                folio: notice.folio,
            })?;
        tracing::info!(
            account = %record.account,
            kind = %record.kind,
            folio = %record.folio,
            response = notice.response.as_str(),
            code = %notice.code,
            "counterparty notice recorded"
        );
        record.record_counterparty(CounterpartyNotice {
            response: notice.response,
            code: notice.code,
            detail: notice.detail,
            received_at: self.clock.now(),
        });
        self.submissions.update(&record).await?;
        Ok(record)
    }

    // ─── Folio administration ───────────────────────────────────────────

    /// Flag an issued folio as voided. `reason` must not be blank.
    pub async fn void_folio(
        &self,
        account: &AccountId,
        kind: DocumentKind,
        folio: Folio,
        reason: &str,
    ) -> Result<(), IssuanceError> {
        if reason.trim().is_empty() {
            return Err(IssuanceError::InvalidRequest("void reason is blank".to_string()));
        }
        self.folios.release(account, kind, folio, reason.trim()).await?;
        tracing::info!(account = %account, kind = %kind, folio = %folio, reason = reason.trim(), "folio voided");
        Ok(())
    }

    /// Accept a range granted by the Authority. The grant document must
    /// cover exactly `[start, end]` for `kind`, and when it names a
    /// taxpayer that taxpayer must own the account's certificate. A grant
    /// naming a taxpayer is refused while that cannot be checked.
    pub async fn grant_folio_range(
        &self,
        account: &AccountId,
        kind: DocumentKind,
        start: u64,
        end: u64,
        grant_xml: &str,
    ) -> Result<FolioRange, IssuanceError> {
        let proof = GrantProof::parse(grant_xml)?;
        proof.check_matches(kind, start, end)?;
        if let Some(issuer) = &proof.issuer {
            let material = self.credentials.load(account).map_err(|e| {
                tracing::warn!(
                    account = %account,
                    issuer = %issuer,
                    error = %e,
                    "grant names a taxpayer but the account's certificate cannot be loaded"
                );
                e
            })?;
            let holder = material.certificate().subject_tax_id();
            if holder != issuer {
                return Err(FolioError::InvalidGrant(format!(
                    "grant is for taxpayer {issuer}, account {account} signs as {holder}"
                ))
                .into());
            }
        }
        let range = self
            .folios
            .grant(
                account,
                kind,
                RangeGrant {
                    start,
                    end,
                    grant_xml: grant_xml.to_string(),
                },
            )
            .await?;
        tracing::info!(account = %account, kind = %kind, start, end, "folio range granted");
        Ok(range)
    }

    pub async fn folio_ranges(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<FolioRange>, IssuanceError> {
        Ok(self.folios.ranges(account, kind).await?)
    }

    /// Missing folios between the lowest and highest issued one. Voided
    /// folios are accounted for and never reported as gaps.
    pub async fn folio_gaps(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<FolioGap>, IssuanceError> {
        let issued = self.folios.issued(account, kind).await?;
        Ok(find_gaps(issued.iter().map(|f| f.folio.value())))
    }
}

/// Issuer tax id read back from a stored signed document.
fn issuer_of(record: &SubmissionRecord) -> Option<TaxId> {
    let root = XmlElement::parse(&record.signed_xml).ok()?;
    let document = root.find("Document")?;
    let summary = DocumentSummary::from_element(document).ok()?;
    TaxId::new(summary.issuer_tax_id).ok()
}
