//! # dte-folio — Folio Allocator
//!
//! Issues sequence numbers ("folios") per `(account, kind)` inside ranges
//! granted by the Authority.
//!
//! - [`ledger`]: the allocation rules and an in-memory ledger per key.
//! - [`store`]: the async [`FolioStore`] contract and the per-key-mutex
//!   [`MemoryFolioStore`].
//! - [`pg`]: [`PgFolioStore`], serialized by a Postgres row lock so that
//!   several service instances can issue concurrently.
//! - [`grant`]: reading grant documents.
//! - [`gaps`]: missing-folio intervals for audit reports.
//!
//! Allocation never skips a folio silently and never reuses one: voiding
//! only flags a folio for reporting.

pub mod error;
pub mod gaps;
pub mod grant;
pub mod ledger;
pub mod pg;
pub mod store;

pub use error::FolioError;
pub use gaps::{find_gaps, FolioGap};
pub use grant::GrantProof;
pub use ledger::{
    FolioKey, FolioLedger, FolioOrigin, FolioRange, IssuedFolio, RangeGrant, RangeStatus,
};
pub use pg::PgFolioStore;
pub use store::{FolioStore, MemoryFolioStore};
