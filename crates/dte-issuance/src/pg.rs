//! Postgres submission store.
//!
//! All functions operate on the `submissions` table. State machine
//! constraints are enforced by [`SubmissionRecord`], not in SQL; the table
//! only guarantees one row per `(account, kind, folio)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dte_core::{AccountId, DocumentId, DocumentKind, Folio, TrackingId};
use dte_state::{CounterpartyNotice, SubmissionRecord, SubmissionState, TransitionRecord};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::IssuanceError;
use crate::store::SubmissionStore;

const COLUMNS: &str = "document_id, account_id, doc_kind, folio, signed_xml, tracking_id, state, \
     authority_code, authority_message, attempts, submitted_at, last_checked_at, counterparty, history, \
     created_at, updated_at";

/// [`SubmissionStore`] over the `submissions` table.
#[derive(Debug, Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    document_id: Uuid,
    account_id: String,
    doc_kind: i32,
    folio: i64,
    signed_xml: String,
    tracking_id: Option<String>,
    state: String,
    authority_code: Option<String>,
    authority_message: Option<String>,
    attempts: i32,
    submitted_at: Option<DateTime<Utc>>,
    last_checked_at: Option<DateTime<Utc>>,
    counterparty: Option<serde_json::Value>,
    history: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    fn into_record(self) -> Result<SubmissionRecord, IssuanceError> {
        let kind = u16::try_from(self.doc_kind)
            .map_err(|_| corrupt(format!("doc_kind {} out of range", self.doc_kind)))
            .and_then(|code| DocumentKind::from_code(code).map_err(|e| corrupt(e.to_string())))?;
        let folio = u64::try_from(self.folio)
            .map_err(|_| corrupt(format!("negative folio {}", self.folio)))
            .and_then(|v| Folio::new(v).map_err(|e| corrupt(e.to_string())))?;
        let state = SubmissionState::parse(&self.state)
            .ok_or_else(|| corrupt(format!("unknown submission state {:?}", self.state)))?;
        let counterparty: Option<CounterpartyNotice> = self
            .counterparty
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| corrupt(format!("counterparty: {e}")))?;
        let history: Vec<TransitionRecord> =
            serde_json::from_value(self.history).map_err(|e| corrupt(format!("history: {e}")))?;

        Ok(SubmissionRecord {
            document_id: DocumentId::from_uuid(self.document_id),
            account: AccountId::new(self.account_id).map_err(|e| corrupt(e.to_string()))?,
            kind,
            folio,
            signed_xml: self.signed_xml,
            tracking_id: self
                .tracking_id
                .map(TrackingId::new)
                .transpose()
                .map_err(|e| corrupt(e.to_string()))?,
            state,
            authority_code: self.authority_code,
            authority_message: self.authority_message,
            attempts: u32::try_from(self.attempts).unwrap_or(0),
            submitted_at: self.submitted_at,
            last_checked_at: self.last_checked_at,
            counterparty,
            history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn corrupt(msg: String) -> IssuanceError {
    IssuanceError::Corrupt(msg)
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, IssuanceError> {
    serde_json::to_value(value).map_err(|e| corrupt(format!("failed to serialize {what}: {e}")))
}

fn folio_i64(folio: Folio) -> Result<i64, IssuanceError> {
    i64::try_from(folio.value()).map_err(|_| IssuanceError::InvalidRequest(format!("folio {folio} too large")))
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, record: &SubmissionRecord) -> Result<(), IssuanceError> {
        let history = to_json(&record.history, "history")?;
        let counterparty = record
            .counterparty
            .as_ref()
            .map(|c| to_json(c, "counterparty"))
            .transpose()?;
        sqlx::query(&format!(
            "INSERT INTO submissions ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(*record.document_id.as_uuid())
        .bind(record.account.as_str())
        .bind(i32::from(record.kind.code()))
        .bind(folio_i64(record.folio)?)
        .bind(&record.signed_xml)
        .bind(record.tracking_id.as_ref().map(|t| t.as_str()))
        .bind(record.state.as_str())
        .bind(&record.authority_code)
        .bind(&record.authority_message)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(record.submitted_at)
        .bind(record.last_checked_at)
        .bind(counterparty)
        .bind(history)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, record: &SubmissionRecord) -> Result<(), IssuanceError> {
        let history = to_json(&record.history, "history")?;
        let counterparty = record
            .counterparty
            .as_ref()
            .map(|c| to_json(c, "counterparty"))
            .transpose()?;
        let result = sqlx::query(
            "UPDATE submissions SET tracking_id = $1, state = $2, authority_code = $3,
                 authority_message = $4, attempts = $5, submitted_at = $6, last_checked_at = $7,
                 counterparty = $8, history = $9, updated_at = $10
             WHERE document_id = $11",
        )
        .bind(record.tracking_id.as_ref().map(|t| t.as_str()))
        .bind(record.state.as_str())
        .bind(&record.authority_code)
        .bind(&record.authority_message)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(record.submitted_at)
        .bind(record.last_checked_at)
        .bind(counterparty)
        .bind(history)
        .bind(record.updated_at)
        .bind(*record.document_id.as_uuid())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(IssuanceError::UnknownDocument(record.document_id));
        }
        Ok(())
    }

    async fn get(&self, document_id: DocumentId) -> Result<Option<SubmissionRecord>, IssuanceError> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {COLUMNS} FROM submissions WHERE document_id = $1"
        ))
        .bind(*document_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(SubmissionRow::into_record).transpose()
    }

    async fn find_by_tracking(&self, tracking_id: &TrackingId) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {COLUMNS} FROM submissions WHERE tracking_id = $1 ORDER BY created_at, folio"
        ))
        .bind(tracking_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SubmissionRow::into_record).collect()
    }

    async fn find_by_folio(&self, kind: DocumentKind, folio: Folio) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {COLUMNS} FROM submissions WHERE doc_kind = $1 AND folio = $2 ORDER BY created_at"
        ))
        .bind(i32::from(kind.code()))
        .bind(folio_i64(folio)?)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SubmissionRow::into_record).collect()
    }

    async fn list_in_state(&self, state: SubmissionState) -> Result<Vec<SubmissionRecord>, IssuanceError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {COLUMNS} FROM submissions WHERE state = $1 ORDER BY created_at, folio"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SubmissionRow::into_record).collect()
    }
}
