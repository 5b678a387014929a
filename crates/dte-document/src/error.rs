//! # Document Error Types

use dte_core::{DocumentKind, ErrorKind, ValidationError, XmlError};
use dte_crypto::CryptoError;
use thiserror::Error;

use crate::totals::Totals;

/// Errors from building, signing, or reading a tax document.
///
/// Every variant except `Crypto` is an invalid-document failure: it is
/// raised before a folio is consumed wherever the draft alone decides it.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The draft has no line items.
    #[error("invalid document: no line items")]
    NoLineItems,

    /// A line has a negative quantity or unit price.
    #[error("invalid document: line {line} has negative {field}")]
    NegativeAmount {
        /// 1-based line number.
        line: usize,
        /// `quantity` or `unit_price`.
        field: &'static str,
    },

    /// A required text field is blank.
    #[error("invalid document: {0} is blank")]
    BlankField(&'static str),

    /// Arithmetic left the representable range.
    #[error("invalid document: amount overflow in {0}")]
    AmountOverflow(&'static str),

    /// A taxed line on a kind that only admits exempt lines.
    #[error("invalid document: kind {kind} admits only exempt lines, line {line} is taxed")]
    TaxedLineOnExemptKind {
        /// The exempt-only kind.
        kind: DocumentKind,
        /// 1-based line number.
        line: usize,
    },

    /// A correcting kind without a reference to the corrected document.
    #[error("invalid document: kind {0} requires at least one reference")]
    MissingReference(DocumentKind),

    /// Caller-supplied totals differ from the recomputed totals.
    #[error("invalid document: declared totals {declared:?} differ from computed {computed:?}")]
    TotalsMismatch {
        /// What the caller supplied.
        declared: Totals,
        /// What the line items add up to.
        computed: Totals,
    },

    /// A tax rate outside 0..=10000 basis points.
    #[error("invalid tax rate: {0} basis points")]
    InvalidTaxRate(u32),

    /// A signed document could not be read back.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// An identifier inside the document failed validation.
    #[error("invalid document: {0}")]
    Field(#[from] ValidationError),

    /// Canonical rendering failed.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// Signing or verification failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl DocumentError {
    /// Machine-readable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Crypto(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}
