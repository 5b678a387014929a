//! # Totals
//!
//! Amounts are whole currency units (`i64`); the wire form carries no
//! fractional minor units. Each line routes its amount to the exempt bucket
//! or the net bucket by its `exempt` flag. Tax applies to the net bucket
//! only and rounds half-up to the nearest unit:
//!
//! ```text
//! tax   = (net * rate_bp + 5000) / 10000
//! total = net + exempt + tax
//! ```

use serde::{Deserialize, Serialize};

use crate::draft::LineItem;
use crate::error::DocumentError;

/// A tax rate in basis points (1900 = 19%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TaxRate(u32);

impl TaxRate {
    /// The jurisdiction's standard rate, 19%.
    pub const STANDARD: TaxRate = TaxRate(1900);

    /// Wrap a rate; must be between 0 and 10000 basis points.
    pub fn from_basis_points(bp: u32) -> Result<Self, DocumentError> {
        if bp > 10_000 {
            return Err(DocumentError::InvalidTaxRate(bp));
        }
        Ok(Self(bp))
    }

    /// The rate in basis points.
    pub fn basis_points(&self) -> u32 {
        self.0
    }

    /// Tax on `net`, rounded half-up.
    pub fn apply(&self, net: i64) -> Result<i64, DocumentError> {
        net.checked_mul(i64::from(self.0))
            .and_then(|v| v.checked_add(5_000))
            .map(|v| v / 10_000)
            .ok_or(DocumentError::AmountOverflow("tax"))
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl TryFrom<u32> for TaxRate {
    type Error = DocumentError;

    fn try_from(bp: u32) -> Result<Self, Self::Error> {
        Self::from_basis_points(bp)
    }
}

impl From<TaxRate> for u32 {
    fn from(rate: TaxRate) -> Self {
        rate.0
    }
}

/// Percentage rendering with two decimals (`19.00`).
impl std::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Document totals in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of taxed line amounts.
    pub net: i64,
    /// Sum of exempt line amounts.
    pub exempt: i64,
    /// Tax on `net`.
    pub tax: i64,
    /// `net + exempt + tax`.
    pub total: i64,
}

impl Totals {
    /// Recompute totals from line items.
    pub fn compute(lines: &[LineItem], rate: TaxRate) -> Result<Self, DocumentError> {
        let mut net: i64 = 0;
        let mut exempt: i64 = 0;
        for line in lines {
            let amount = line.amount()?;
            let bucket = if line.exempt { &mut exempt } else { &mut net };
            *bucket = bucket
                .checked_add(amount)
                .ok_or(DocumentError::AmountOverflow("subtotal"))?;
        }
        let tax = rate.apply(net)?;
        let total = net
            .checked_add(exempt)
            .and_then(|v| v.checked_add(tax))
            .ok_or(DocumentError::AmountOverflow("total"))?;
        Ok(Self {
            net,
            exempt,
            tax,
            total,
        })
    }
}
