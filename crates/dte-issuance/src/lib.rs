//! # dte-issuance — Issuance Pipeline
//!
//! Composition root of the DTE stack. [`IssuanceService`] ties the folio
//! allocator, the canonicalizer and signer, the Authority transmitter, and
//! the status reconciler to submission persistence.
//!
//! ## Operations
//!
//! | Operation | Composes |
//! |-----------|----------|
//! | [`IssuanceService::issue`] | validate, allocate, canonicalize, sign, store, transmit |
//! | [`IssuanceService::check_status`] | [`StatusReconciler`] |
//! | [`IssuanceService::void_folio`] | `FolioStore::release` |
//! | [`IssuanceService::grant_folio_range`] | `GrantProof` check, `FolioStore::grant` |
//! | [`IssuanceService::resubmit`] | transmit stored bytes again |
//! | [`IssuanceService::submit_batch`] | one cover sheet, one tracking id |
//! | [`IssuanceService::folio_gaps`] | gap detection over issued folios |
//! | [`IssuanceService::ingest_acceptance_notice`] | counterparty verdicts |
//!
//! ## Persistence
//!
//! [`db::init_pool`] connects to Postgres when `DATABASE_URL` is set and
//! applies the migrations in `migrations/`. Without it the service runs on
//! [`MemorySubmissionStore`] and `MemoryFolioStore`.

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod pg;
pub mod poller;
pub mod reconciler;
pub mod service;
pub mod store;

pub use config::{CredentialConfig, IssuanceConfig};
pub use error::IssuanceError;
pub use metrics::IssuanceMetrics;
pub use pg::PgSubmissionStore;
pub use poller::spawn_status_poller;
pub use reconciler::StatusReconciler;
pub use service::{IssuanceService, IssuanceStores, IssuedDocument};
pub use store::{MemorySubmissionStore, SubmissionStore};
