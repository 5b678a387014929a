//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the DTE stack.
//! String identifiers validate at construction and at deserialization;
//! UUID identifiers are valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Routes `Deserialize` through the validating `new()` constructor so that
/// invalid values are rejected at the boundary.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// The issuing business account (tenant) a folio sequence belongs to.
///
/// 1–64 characters drawn from ASCII alphanumerics, `-`, `_` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Validate and wrap an account identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() || value.len() > 64 {
            return Err(ValidationError::InvalidAccountId {
                reason: format!("length must be 1..=64, got {}", value.len()),
                value,
            });
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ValidationError::InvalidAccountId {
                reason: format!("disallowed character {c:?}"),
                value,
            });
        }
        Ok(Self(value))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(AccountId);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TaxId
// ---------------------------------------------------------------------------

/// A taxpayer identifier in `digits-checkchar` form (e.g. `76086428-5`).
///
/// The check character is a digit or `K`. Lowercase `k` is normalized.
/// Leading dots used as thousands separators are stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaxId(String);

impl TaxId {
    /// Validate and normalize a tax identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw: String = value.into();
        let normalized = raw.replace('.', "").to_ascii_uppercase();
        let Some((body, check)) = normalized.split_once('-') else {
            return Err(ValidationError::InvalidTaxId {
                value: raw,
                reason: "missing '-' before check character".to_string(),
            });
        };
        if body.is_empty() || body.len() > 8 || !body.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidTaxId {
                value: raw,
                reason: "body must be 1..=8 digits".to_string(),
            });
        }
        if check.len() != 1 || !check.bytes().all(|b| b.is_ascii_digit() || b == b'K') {
            return Err(ValidationError::InvalidTaxId {
                value: raw,
                reason: "check character must be a digit or K".to_string(),
            });
        }
        Ok(Self(normalized))
    }

    /// Borrow the normalized identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(TaxId);

impl std::fmt::Display for TaxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Folio
// ---------------------------------------------------------------------------

/// A sequential document number inside an Authority-granted range.
///
/// Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Folio(u64);

impl Folio {
    /// Wrap a folio number. Zero is rejected.
    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::ZeroFolio);
        }
        Ok(Self(value))
    }

    /// The raw folio number.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The next folio, or `None` on overflow.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl TryFrom<u64> for Folio {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Folio> for u64 {
    fn from(folio: Folio) -> Self {
        folio.0
    }
}

impl std::fmt::Display for Folio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TrackingId
// ---------------------------------------------------------------------------

/// Opaque identifier the Authority returns for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    /// Wrap a tracking identifier. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(ValidationError::EmptyTrackingId);
        }
        Ok(Self(value))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(TrackingId);

impl std::fmt::Display for TrackingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// Internal identifier of an issued document and its submission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new random document identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}
