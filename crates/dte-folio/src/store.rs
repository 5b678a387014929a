//! # Folio Stores
//!
//! [`FolioStore`] is the allocator contract. Every mutating call for one
//! `(account, kind)` key is serialized; calls for different keys proceed
//! independently.
//!
//! [`MemoryFolioStore`] serializes with one mutex per key and suits tests
//! and single-process deployments. Multi-instance deployments use
//! [`PgFolioStore`](crate::pg::PgFolioStore), whose lock is a database row
//! lock visible to every process.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dte_core::{AccountId, Clock, DocumentKind, Folio, SystemClock};
use parking_lot::Mutex;

use crate::error::FolioError;
use crate::ledger::{FolioKey, FolioLedger, FolioRange, IssuedFolio, RangeGrant};

/// The folio allocator contract.
#[async_trait]
pub trait FolioStore: Send + Sync {
    /// Increment the counter and return the new folio.
    ///
    /// Fails with `RangeExhausted`, leaving the counter unchanged, when the
    /// next folio lies outside every open range.
    async fn allocate(&self, account: &AccountId, kind: DocumentKind) -> Result<Folio, FolioError>;

    /// Claim a specific unused, in-range folio.
    async fn reserve(&self, account: &AccountId, kind: DocumentKind, folio: Folio) -> Result<(), FolioError>;

    /// Flag an issued folio as voided. The folio is never reissued.
    async fn release(
        &self,
        account: &AccountId,
        kind: DocumentKind,
        folio: Folio,
        reason: &str,
    ) -> Result<(), FolioError>;

    /// Accept a new range and raise the counter floor to
    /// `max(counter, start - 1)`.
    async fn grant(&self, account: &AccountId, kind: DocumentKind, grant: RangeGrant)
        -> Result<FolioRange, FolioError>;

    /// All claimed folios for the key, ascending.
    async fn issued(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<IssuedFolio>, FolioError>;

    /// All ranges for the key, in grant order.
    async fn ranges(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<FolioRange>, FolioError>;

    /// Current counter value (zero before the first grant).
    async fn counter(&self, account: &AccountId, kind: DocumentKind) -> Result<u64, FolioError>;
}

/// In-process folio store with a mutex per key.
pub struct MemoryFolioStore {
    ledgers: DashMap<FolioKey, Arc<Mutex<FolioLedger>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryFolioStore {
    /// Empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledgers: DashMap::new(),
            clock,
        }
    }

    fn ledger(&self, account: &AccountId, kind: DocumentKind) -> Arc<Mutex<FolioLedger>> {
        let key = FolioKey::new(account.clone(), kind);
        // Clone the Arc out so the shard lock is released before the key
        // mutex is taken.
        Arc::clone(
            self.ledgers
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(FolioLedger::new(key))))
                .value(),
        )
    }
}

impl Default for MemoryFolioStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryFolioStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFolioStore")
            .field("keys", &self.ledgers.len())
            .finish()
    }
}

#[async_trait]
impl FolioStore for MemoryFolioStore {
    async fn allocate(&self, account: &AccountId, kind: DocumentKind) -> Result<Folio, FolioError> {
        let ledger = self.ledger(account, kind);
        let result = ledger.lock().allocate(self.clock.now());
        match &result {
            Ok(folio) => tracing::debug!(account = %account, kind = %kind, folio = %folio, "allocated folio"),
            Err(e) => tracing::warn!(account = %account, kind = %kind, error = %e, "folio allocation failed"),
        }
        result
    }

    async fn reserve(&self, account: &AccountId, kind: DocumentKind, folio: Folio) -> Result<(), FolioError> {
        let ledger = self.ledger(account, kind);
        let result = ledger.lock().reserve(folio, self.clock.now());
        if result.is_ok() {
            tracing::info!(account = %account, kind = %kind, folio = %folio, "reserved folio");
        }
        result
    }

    async fn release(
        &self,
        account: &AccountId,
        kind: DocumentKind,
        folio: Folio,
        reason: &str,
    ) -> Result<(), FolioError> {
        let ledger = self.ledger(account, kind);
        let result = ledger.lock().release(folio, reason, self.clock.now());
        if result.is_ok() {
            tracing::info!(account = %account, kind = %kind, folio = %folio, reason, "voided folio");
        }
        result
    }

    async fn grant(
        &self,
        account: &AccountId,
        kind: DocumentKind,
        grant: RangeGrant,
    ) -> Result<FolioRange, FolioError> {
        let ledger = self.ledger(account, kind);
        let mut guard = ledger.lock();
        let range = guard.grant(grant, self.clock.now())?;
        tracing::info!(
            account = %account,
            kind = %kind,
            start = range.start,
            end = range.end,
            counter = guard.counter(),
            "accepted folio range"
        );
        Ok(range)
    }

    async fn issued(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<IssuedFolio>, FolioError> {
        Ok(self.ledger(account, kind).lock().issued().cloned().collect())
    }

    async fn ranges(&self, account: &AccountId, kind: DocumentKind) -> Result<Vec<FolioRange>, FolioError> {
        Ok(self.ledger(account, kind).lock().ranges().to_vec())
    }

    async fn counter(&self, account: &AccountId, kind: DocumentKind) -> Result<u64, FolioError> {
        Ok(self.ledger(account, kind).lock().counter())
    }
}
