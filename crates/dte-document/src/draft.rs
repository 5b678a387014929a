//! # Document Drafts
//!
//! A [`DocumentDraft`] is what the business layer hands over: parties,
//! line items, optional references, and optionally the totals it computed
//! itself. It carries no folio; [`DocumentDraft::validate`] runs every
//! structural check so that a doomed document fails before a folio is
//! allocated.

use chrono::NaiveDate;
use dte_core::{DocumentKind, Folio, TaxId};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::totals::{TaxRate, Totals};

/// One line of a tax document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description.
    pub description: String,
    /// Quantity, whole units.
    pub quantity: i64,
    /// Price per unit, whole currency units.
    pub unit_price: i64,
    /// Exempt lines count toward the exempt bucket and carry no tax.
    #[serde(default)]
    pub exempt: bool,
}

impl LineItem {
    /// `quantity * unit_price`.
    pub fn amount(&self) -> Result<i64, DocumentError> {
        self.quantity
            .checked_mul(self.unit_price)
            .ok_or(DocumentError::AmountOverflow("line amount"))
    }
}

/// Issuer or receiver of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Taxpayer identifier.
    pub tax_id: TaxId,
    /// Legal name.
    pub name: String,
    /// Street address, if printed on the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Why a document references an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceReason {
    /// Voids the referenced document.
    Void,
    /// Corrects text (names, descriptions) only.
    TextCorrection,
    /// Corrects amounts.
    AmountCorrection,
}

impl ReferenceReason {
    /// The Authority's reason code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Void => 1,
            Self::TextCorrection => 2,
            Self::AmountCorrection => 3,
        }
    }

    /// Parse a reason code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Void),
            2 => Some(Self::TextCorrection),
            3 => Some(Self::AmountCorrection),
            _ => None,
        }
    }
}

/// A pointer from a correcting document to the document it corrects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Kind of the referenced document.
    pub kind: DocumentKind,
    /// Folio of the referenced document.
    pub folio: Folio,
    /// Issue date of the referenced document.
    pub date: NaiveDate,
    /// Reason for the reference.
    pub reason: ReferenceReason,
    /// Free-text explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A decided-to-issue document, before numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    /// Document kind.
    pub kind: DocumentKind,
    /// Issue date; certificate validity is checked against this date.
    pub issue_date: NaiveDate,
    /// Issuing business.
    pub issuer: Party,
    /// Counterparty.
    pub receiver: Party,
    /// Line items, in print order.
    pub lines: Vec<LineItem>,
    /// References to corrected documents.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    /// Totals as computed by the caller. When present they must equal the
    /// recomputed totals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_totals: Option<Totals>,
}

impl DocumentDraft {
    /// Run every structural check and return the recomputed totals.
    pub fn validate(&self, rate: TaxRate) -> Result<Totals, DocumentError> {
        if self.lines.is_empty() {
            return Err(DocumentError::NoLineItems);
        }
        check_party(&self.issuer, "issuer name")?;
        check_party(&self.receiver, "receiver name")?;

        for (i, line) in self.lines.iter().enumerate() {
            let n = i + 1;
            if line.description.trim().is_empty() {
                return Err(DocumentError::BlankField("line description"));
            }
            if line.quantity < 0 {
                return Err(DocumentError::NegativeAmount {
                    line: n,
                    field: "quantity",
                });
            }
            if line.unit_price < 0 {
                return Err(DocumentError::NegativeAmount {
                    line: n,
                    field: "unit_price",
                });
            }
            if self.kind.is_exempt_only() && !line.exempt {
                return Err(DocumentError::TaxedLineOnExemptKind {
                    kind: self.kind,
                    line: n,
                });
            }
        }

        if self.kind.requires_reference() && self.references.is_empty() {
            return Err(DocumentError::MissingReference(self.kind));
        }

        let computed = Totals::compute(&self.lines, rate)?;
        if let Some(declared) = self.declared_totals {
            if declared != computed {
                return Err(DocumentError::TotalsMismatch { declared, computed });
            }
        }
        Ok(computed)
    }
}

fn check_party(party: &Party, field: &'static str) -> Result<(), DocumentError> {
    if party.name.trim().is_empty() {
        return Err(DocumentError::BlankField(field));
    }
    Ok(())
}
