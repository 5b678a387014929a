//! # Folio Error Types

use dte_core::{DocumentKind, ErrorKind, ValidationError};
use thiserror::Error;

/// Errors from folio allocation and range management.
#[derive(Error, Debug)]
pub enum FolioError {
    /// The next folio lies outside every open range.
    #[error("folio range exhausted for account {account} kind {kind} (counter at {counter})")]
    RangeExhausted {
        /// Account whose ranges are exhausted.
        account: String,
        /// Document kind.
        kind: DocumentKind,
        /// Counter value, unchanged by the failed allocation.
        counter: u64,
    },

    /// A specific folio was requested but is already claimed.
    #[error("folio {folio} is already in use")]
    FolioInUse {
        /// The contested folio.
        folio: u64,
    },

    /// A specific folio lies outside every open range.
    #[error("folio {folio} is outside every open range")]
    OutOfRange {
        /// The requested folio.
        folio: u64,
    },

    /// Void requested for a folio that was never issued.
    #[error("folio {folio} was never issued")]
    NotIssued {
        /// The requested folio.
        folio: u64,
    },

    /// A range with `start > end` or a zero bound.
    #[error("invalid range [{start}, {end}]")]
    InvalidRange {
        /// Range start.
        start: u64,
        /// Range end.
        end: u64,
    },

    /// A new range overlaps a range that is still open.
    #[error("range [{start}, {end}] overlaps open range [{open_start}, {open_end}]")]
    RangeOverlap {
        /// New range start.
        start: u64,
        /// New range end.
        end: u64,
        /// Overlapped range start.
        open_start: u64,
        /// Overlapped range end.
        open_end: u64,
    },

    /// A new range ends at or below the counter and would orphan issued
    /// folios.
    #[error("range ending at {end} lies entirely at or below the counter {counter}")]
    RangeBelowCounter {
        /// New range end.
        end: u64,
        /// Current counter.
        counter: u64,
    },

    /// The grant proof is unreadable or disagrees with the declared range.
    #[error("invalid grant proof: {0}")]
    InvalidGrant(String),

    /// A stored value failed domain validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failure.
    #[error("folio storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl FolioError {
    /// Machine-readable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RangeExhausted { .. } => ErrorKind::ResourceExhaustion,
            Self::FolioInUse { .. } => ErrorKind::ConcurrencyConflict,
            Self::NotIssued { .. } => ErrorKind::NotFound,
            Self::OutOfRange { .. }
            | Self::InvalidRange { .. }
            | Self::RangeOverlap { .. }
            | Self::RangeBelowCounter { .. }
            | Self::InvalidGrant(_)
            | Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}
