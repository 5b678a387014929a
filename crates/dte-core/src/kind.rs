//! # Document Kinds
//!
//! The Authority identifies each tax document type by a numeric code. Folio
//! sequences are kept per `(account, kind)`, so the kind is part of every
//! allocator key.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Tax document type, keyed by the Authority's numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum DocumentKind {
    /// 33 — electronic invoice.
    Invoice,
    /// 34 — electronic exempt invoice.
    ExemptInvoice,
    /// 39 — electronic receipt.
    Receipt,
    /// 41 — electronic exempt receipt.
    ExemptReceipt,
    /// 52 — electronic dispatch guide.
    DispatchGuide,
    /// 56 — electronic debit note.
    DebitNote,
    /// 61 — electronic credit note.
    CreditNote,
}

impl DocumentKind {
    /// Every kind the Authority accepts.
    pub const ALL: [DocumentKind; 7] = [
        Self::Invoice,
        Self::ExemptInvoice,
        Self::Receipt,
        Self::ExemptReceipt,
        Self::DispatchGuide,
        Self::DebitNote,
        Self::CreditNote,
    ];

    /// Parse an Authority kind code.
    pub fn from_code(code: u16) -> Result<Self, ValidationError> {
        match code {
            33 => Ok(Self::Invoice),
            34 => Ok(Self::ExemptInvoice),
            39 => Ok(Self::Receipt),
            41 => Ok(Self::ExemptReceipt),
            52 => Ok(Self::DispatchGuide),
            56 => Ok(Self::DebitNote),
            61 => Ok(Self::CreditNote),
            other => Err(ValidationError::UnknownDocumentKind(other)),
        }
    }

    /// The Authority's numeric code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Invoice => 33,
            Self::ExemptInvoice => 34,
            Self::Receipt => 39,
            Self::ExemptReceipt => 41,
            Self::DispatchGuide => 52,
            Self::DebitNote => 56,
            Self::CreditNote => 61,
        }
    }

    /// Whether every line of this kind must be tax exempt.
    pub fn is_exempt_only(&self) -> bool {
        matches!(self, Self::ExemptInvoice | Self::ExemptReceipt)
    }

    /// Whether the document corrects an earlier one and must reference it.
    pub fn requires_reference(&self) -> bool {
        matches!(self, Self::DebitNote | Self::CreditNote)
    }
}

impl TryFrom<u16> for DocumentKind {
    type Error = ValidationError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<DocumentKind> for u16 {
    fn from(kind: DocumentKind) -> Self {
        kind.code()
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
