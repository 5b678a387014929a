//! # Submission Persistence
//!
//! [`SubmissionStore`] holds one [`SubmissionRecord`] per signed document.
//! The signed XML is written once at insert; later writes replace the
//! mutable parts of the record (state, tracking id, Authority answer,
//! history).
//!
//! - [`MemorySubmissionStore`]: `DashMap`, for tests and single-process use.
//! - [`PgSubmissionStore`](crate::pg::PgSubmissionStore): the `submissions` table.

use async_trait::async_trait;
use dashmap::DashMap;
use dte_core::{DocumentId, DocumentKind, Folio, TrackingId};
use dte_state::{SubmissionRecord, SubmissionState};

use crate::error::IssuanceError;

/// Storage for submission records.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Store a new record. Fails if the id already exists.
    async fn insert(&self, record: &SubmissionRecord) -> Result<(), IssuanceError>;

    /// Replace the mutable fields of an existing record.
    async fn update(&self, record: &SubmissionRecord) -> Result<(), IssuanceError>;

    /// Fetch one record.
    async fn get(&self, document_id: DocumentId) -> Result<Option<SubmissionRecord>, IssuanceError>;

    /// Every record uploaded under `tracking_id`.
    async fn find_by_tracking(&self, tracking_id: &TrackingId) -> Result<Vec<SubmissionRecord>, IssuanceError>;

    /// Every record numbered `folio` of `kind`, across accounts.
    async fn find_by_folio(&self, kind: DocumentKind, folio: Folio) -> Result<Vec<SubmissionRecord>, IssuanceError>;

    /// Every record currently in `state`, oldest first.
    async fn list_in_state(&self, state: SubmissionState) -> Result<Vec<SubmissionRecord>, IssuanceError>;
}

/// In-memory [`SubmissionStore`].
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    records: DashMap<DocumentId, SubmissionRecord>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, pred: impl Fn(&SubmissionRecord) -> bool) -> Vec<SubmissionRecord> {
        let mut out: Vec<_> = self
            .records
            .iter()
            .filter(|r| pred(r.value()))
            .map(|r| r.value().clone())
            .collect();
        out.sort_by_key(|r| (r.created_at, r.folio));
        out
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn insert(&self, record: &SubmissionRecord) -> Result<(), IssuanceError> {
        match self.records.entry(record.document_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(IssuanceError::InvalidRequest(format!(
                "document {} already stored",
                record.document_id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, record: &SubmissionRecord) -> Result<(), IssuanceError> {
        match self.records.get_mut(&record.document_id) {
            Some(mut existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(IssuanceError::UnknownDocument(record.document_id)),
        }
    }

    async fn get(&self, document_id: DocumentId) -> Result<Option<SubmissionRecord>, IssuanceError> {
        Ok(self.records.get(&document_id).map(|r| r.value().clone()))
    }

    async fn find_by_tracking(&self, tracking_id: &TrackingId) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        Ok(self.collect(|r| r.tracking_id.as_ref() == Some(tracking_id)))
    }

    async fn find_by_folio(&self, kind: DocumentKind, folio: Folio) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        Ok(self.collect(|r| r.kind == kind && r.folio == folio))
    }

    async fn list_in_state(&self, state: SubmissionState) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        Ok(self.collect(|r| r.state == state))
    }
}
