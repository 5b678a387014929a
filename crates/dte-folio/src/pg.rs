//! # Postgres Folio Store
//!
//! Every mutating operation runs in one transaction that first locks the
//! key's `folio_counters` row with `SELECT ... FOR UPDATE`. Concurrent
//! callers for the same key, in this process or any other, queue on that
//! row lock; callers for other keys lock other rows.
//!
//! Tables (see the `dte-issuance` migrations): `folio_ranges`,
//! `folio_counters`, `issued_folios`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dte_core::{AccountId, DocumentKind, Folio};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::FolioError;
use crate::ledger::{
    check_reservable, next_folio, plan_grant, FolioKey, FolioOrigin, FolioRange, IssuedFolio, RangeGrant,
    RangeStatus,
};
use crate::store::FolioStore;

/// Folio store backed by Postgres row locks.
#[derive(Debug, Clone)]
pub struct PgFolioStore {
    pool: PgPool,
}

impl PgFolioStore {
    /// Wrap a pool whose schema is already migrated.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RangeRow {
    id: Uuid,
    range_start: i64,
    range_end: i64,
    grant_xml: String,
    granted_at: DateTime<Utc>,
    status: String,
}

impl RangeRow {
    fn into_range(self) -> Result<FolioRange, FolioError> {
        Ok(FolioRange {
            id: self.id,
            start: to_u64(self.range_start)?,
            end: to_u64(self.range_end)?,
            grant_xml: self.grant_xml,
            granted_at: self.granted_at,
            status: RangeStatus::parse(&self.status)
                .ok_or_else(|| decode_error(format!("unknown range status {:?}", self.status)))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IssuedRow {
    folio: i64,
    origin: String,
    issued_at: DateTime<Utc>,
    void_reason: Option<String>,
    voided_at: Option<DateTime<Utc>>,
}

impl IssuedRow {
    fn into_issued(self) -> Result<IssuedFolio, FolioError> {
        Ok(IssuedFolio {
            folio: Folio::new(to_u64(self.folio)?)?,
            origin: FolioOrigin::parse(&self.origin)
                .ok_or_else(|| decode_error(format!("unknown folio origin {:?}", self.origin)))?,
            issued_at: self.issued_at,
            void_reason: self.void_reason,
            voided_at: self.voided_at,
        })
    }
}

fn to_u64(v: i64) -> Result<u64, FolioError> {
    u64::try_from(v).map_err(|_| decode_error(format!("negative folio value {v}")))
}

fn to_i64(v: u64) -> Result<i64, FolioError> {
    i64::try_from(v).map_err(|_| FolioError::InvalidRange { start: v, end: v })
}

fn decode_error(msg: String) -> FolioError {
    FolioError::Storage(sqlx::Error::Decode(msg.into()))
}

/// Create the counter row if missing, then lock it for the transaction.
async fn lock_counter(tx: &mut Transaction<'_, Postgres>, key: &FolioKey) -> Result<u64, FolioError> {
    sqlx::query(
        "INSERT INTO folio_counters (account_id, doc_kind, current_value, updated_at)
         VALUES ($1, $2, 0, now())
         ON CONFLICT (account_id, doc_kind) DO NOTHING",
    )
    .bind(key.account.as_str())
    .bind(i32::from(key.kind.code()))
    .execute(&mut **tx)
    .await?;

    let (value,): (i64,) = sqlx::query_as(
        "SELECT current_value FROM folio_counters
         WHERE account_id = $1 AND doc_kind = $2
         FOR UPDATE",
    )
    .bind(key.account.as_str())
    .bind(i32::from(key.kind.code()))
    .fetch_one(&mut **tx)
    .await?;
    to_u64(value)
}

async fn load_ranges(
    executor: impl sqlx::PgExecutor<'_>,
    key: &FolioKey,
) -> Result<Vec<FolioRange>, FolioError> {
    let rows = sqlx::query_as::<_, RangeRow>(
        "SELECT id, range_start, range_end, grant_xml, granted_at, status
         FROM folio_ranges
         WHERE account_id = $1 AND doc_kind = $2
         ORDER BY granted_at, range_start",
    )
    .bind(key.account.as_str())
    .bind(i32::from(key.kind.code()))
    .fetch_all(executor)
    .await?;
    rows.into_iter().map(RangeRow::into_range).collect()
}

async fn set_counter(tx: &mut Transaction<'_, Postgres>, key: &FolioKey, value: u64) -> Result<(), FolioError> {
    sqlx::query(
        "UPDATE folio_counters SET current_value = $3, updated_at = now()
         WHERE account_id = $1 AND doc_kind = $2",
    )
    .bind(key.account.as_str())
    .bind(i32::from(key.kind.code()))
    .bind(to_i64(value)?)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn set_range_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: RangeStatus,
) -> Result<(), FolioError> {
    sqlx::query("UPDATE folio_ranges SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_issued(
    tx: &mut Transaction<'_, Postgres>,
    key: &FolioKey,
    folio: u64,
    origin: FolioOrigin,
) -> Result<(), FolioError> {
    sqlx::query(
        "INSERT INTO issued_folios (account_id, doc_kind, folio, origin, issued_at)
         VALUES ($1, $2, $3, $4, now())",
    )
    .bind(key.account.as_str())
    .bind(i32::from(key.kind.code()))
    .bind(to_i64(folio)?)
    .bind(origin.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl FolioStore for PgFolioStore {
    async fn allocate(&self, account: &AccountId, kind: DocumentKind) -> Result<Folio, FolioError> {
        let key = FolioKey::new(account.clone(), kind);
        let mut tx = self.pool.begin().await?;
        let counter = lock_counter(&mut tx, &key).await?;
        let ranges = load_ranges(&mut *tx, &key).await?;

        let claimed: Vec<(i64,)> = sqlx::query_as(
            "SELECT folio FROM issued_folios
             WHERE account_id = $1 AND doc_kind = $2 AND folio > $3",
        )
        .bind(account.as_str())
        .bind(i32::from(kind.code()))
        .bind(to_i64(counter)?)
        .fetch_all(&mut *tx)
        .await?;
        let claimed_above: BTreeSet<u64> = claimed
            .into_iter()
            .map(|(f,)| to_u64(f))
            .collect::<Result<_, _>>()?;

        let Some(candidate) = next_folio(counter, &claimed_above, &ranges) else {
            tx.rollback().await?;
            tracing::warn!(account = %account, kind = %kind, counter, "folio range exhausted");
            return Err(key.exhausted(counter));
        };
        let folio = Folio::new(candidate)?;

        set_counter(&mut tx, &key, candidate).await?;
        insert_issued(&mut tx, &key, candidate, FolioOrigin::Allocated).await?;
        for range in ranges.iter().filter(|r| r.is_open() && r.end <= candidate) {
            set_range_status(&mut tx, range.id, RangeStatus::Exhausted).await?;
        }
        tx.commit().await?;

        tracing::debug!(account = %account, kind = %kind, folio = %folio, "allocated folio");
        Ok(folio)
    }

    async fn reserve(&self, account: &AccountId, kind: DocumentKind, folio: Folio) -> Result<(), FolioError> {
        let key = FolioKey::new(account.clone(), kind);
        let mut tx = self.pool.begin().await?;
        lock_counter(&mut tx, &key).await?;
        let ranges = load_ranges(&mut *tx, &key).await?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT folio FROM issued_folios
             WHERE account_id = $1 AND doc_kind = $2 AND folio = $3",
        )
        .bind(account.as_str())
        .bind(i32::from(kind.code()))
        .bind(to_i64(folio.value())?)
        .fetch_optional(&mut *tx)
        .await?;

        if let Err(e) = check_reservable(folio.value(), existing.is_some(), &ranges) {
            tx.rollback().await?;
            return Err(e);
        }
        insert_issued(&mut tx, &key, folio.value(), FolioOrigin::Reserved).await?;
        tx.commit().await?;

        tracing::info!(account = %account, kind = %kind, folio = %folio, "reserved folio");
        Ok(())
    }

    async fn release(
        &self,
        account: &AccountId,
        kind: DocumentKind,
        folio: Folio,
        reason: &str,
    ) -> Result<(), FolioError> {
        let exists: Option<(i64,)> = sqlx::query_as(
            "SELECT folio FROM issued_folios
             WHERE account_id = $1 AND doc_kind = $2 AND folio = $3",
        )
        .bind(account.as_str())
        .bind(i32::from(kind.code()))
        .bind(to_i64(folio.value())?)
        .fetch_optional(&self.pool)
        .await?;
        if exists.is_none() {
            return Err(FolioError::NotIssued { folio: folio.value() });
        }

        // First void wins; repeating it is a no-op.
        sqlx::query(
            "UPDATE issued_folios SET void_reason = $4, voided_at = now()
             WHERE account_id = $1 AND doc_kind = $2 AND folio = $3 AND voided_at IS NULL",
        )
        .bind(account.as_str())
        .bind(i32::from(kind.code()))
        .bind(to_i64(folio.value())?)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        tracing::info!(account = %account, kind = %kind, folio = %folio, reason, "voided folio");
        Ok(())
    }

    async fn grant(
        &self,
        account: &AccountId,
        kind: DocumentKind,
        grant: RangeGrant,
    ) -> Result<FolioRange, FolioError> {
        let key = FolioKey::new(account.clone(), kind);
        let mut tx = self.pool.begin().await?;
        let counter = lock_counter(&mut tx, &key).await?;
        let ranges = load_ranges(&mut *tx, &key).await?;

        let plan = match plan_grant(counter, &ranges, grant.start, grant.end) {
            Ok(plan) => plan,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        for range in ranges.iter().filter(|r| plan.retire.contains(&r.id)) {
            let status = if range.end <= counter {
                RangeStatus::Exhausted
            } else {
                RangeStatus::Superseded
            };
            set_range_status(&mut tx, range.id, status).await?;
        }
        set_counter(&mut tx, &key, plan.floor).await?;

        let id = Uuid::new_v4();
        let (granted_at,): (DateTime<Utc>,) = sqlx::query_as(
            "INSERT INTO folio_ranges
             (id, account_id, doc_kind, range_start, range_end, grant_xml, granted_at, status)
             VALUES ($1, $2, $3, $4, $5, $6, now(), 'open')
             RETURNING granted_at",
        )
        .bind(id)
        .bind(account.as_str())
        .bind(i32::from(kind.code()))
        .bind(to_i64(grant.start)?)
        .bind(to_i64(grant.end)?)
        .bind(&grant.grant_xml)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            account = %account,
            kind = %kind,
            start = grant.start,
            end = grant.end,
            counter = plan.floor,
            "accepted folio range"
        );
        Ok(FolioRange {
            id,
            start: grant.start,
            end: grant.end,
            grant_xml: grant.grant_xml,
            granted_at,
            status: RangeStatus::Open,
        })
    }

    async fn issued(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<IssuedFolio>, FolioError> {
        let rows = sqlx::query_as::<_, IssuedRow>(
            "SELECT folio, origin, issued_at, void_reason, voided_at
             FROM issued_folios
             WHERE account_id = $1 AND doc_kind = $2
             ORDER BY folio",
        )
        .bind(account.as_str())
        .bind(i32::from(kind.code()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(IssuedRow::into_issued).collect()
    }

    async fn ranges(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<FolioRange>, FolioError> {
        load_ranges(&self.pool, &FolioKey::new(account.clone(), kind)).await
    }

    async fn counter(&self, account: &AccountId, kind: DocumentKind) -> Result<u64, FolioError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT current_value FROM folio_counters WHERE account_id = $1 AND doc_kind = $2",
        )
        .bind(account.as_str())
        .bind(i32::from(kind.code()))
        .fetch_optional(&self.pool)
        .await?;
        row.map_or(Ok(0), |(v,)| to_u64(v))
    }
}
