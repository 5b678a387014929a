//! # Folio Ledger
//!
//! The allocation rules for one `(account, kind)` key, independent of
//! where the state lives. Both stores apply the same rules: the memory
//! store to a [`FolioLedger`] behind a per-key mutex, the Postgres store to
//! rows read under `SELECT ... FOR UPDATE`.
//!
//! ## Invariants
//!
//! - The counter never decreases.
//! - An allocated folio lies inside an open range at allocation time.
//! - A folio is claimed at most once, by `allocate` or `reserve`.
//! - Open ranges of one key never overlap.
//! - Voiding flags a folio; it never makes the folio allocatable again.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use dte_core::{AccountId, DocumentKind, Folio};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FolioError;

/// Allocation key: folio sequences are independent per account and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolioKey {
    /// Issuing account.
    pub account: AccountId,
    /// Document kind.
    pub kind: DocumentKind,
}

impl FolioKey {
    /// Build a key.
    pub fn new(account: AccountId, kind: DocumentKind) -> Self {
        Self { account, kind }
    }

    pub(crate) fn exhausted(&self, counter: u64) -> FolioError {
        FolioError::RangeExhausted {
            account: self.account.to_string(),
            kind: self.kind,
            counter,
        }
    }
}

impl std::fmt::Display for FolioKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account, self.kind)
    }
}

/// Lifecycle of a granted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    /// Folios may be allocated from this range.
    Open,
    /// The counter reached the range end.
    Exhausted,
    /// A later grant moved the counter floor past the range end.
    Superseded,
}

impl RangeStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Exhausted => "exhausted",
            Self::Superseded => "superseded",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "exhausted" => Some(Self::Exhausted),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }
}

/// An Authority-granted block of folios, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolioRange {
    /// Internal identifier.
    pub id: Uuid,
    /// First folio.
    pub start: u64,
    /// Last folio.
    pub end: u64,
    /// The grant document as received.
    pub grant_xml: String,
    /// When the grant was accepted.
    pub granted_at: DateTime<Utc>,
    /// Current status.
    pub status: RangeStatus,
}

impl FolioRange {
    /// Whether `folio` lies inside the range.
    pub fn contains(&self, folio: u64) -> bool {
        self.start <= folio && folio <= self.end
    }

    /// Whether the range is still open.
    pub fn is_open(&self) -> bool {
        self.status == RangeStatus::Open
    }

    /// Number of folios in the range.
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// How a folio was claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolioOrigin {
    /// Returned by `allocate`.
    Allocated,
    /// Claimed explicitly by `reserve`.
    Reserved,
}

impl FolioOrigin {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocated => "allocated",
            Self::Reserved => "reserved",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allocated" => Some(Self::Allocated),
            "reserved" => Some(Self::Reserved),
            _ => None,
        }
    }
}

/// A claimed folio and its audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedFolio {
    /// The folio.
    pub folio: Folio,
    /// How it was claimed.
    pub origin: FolioOrigin,
    /// When it was claimed.
    pub issued_at: DateTime<Utc>,
    /// Void reason, once voided.
    pub void_reason: Option<String>,
    /// When it was voided.
    pub voided_at: Option<DateTime<Utc>>,
}

impl IssuedFolio {
    /// Whether the folio has been voided.
    pub fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }
}

/// A range the caller wants to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeGrant {
    /// First folio.
    pub start: u64,
    /// Last folio.
    pub end: u64,
    /// The grant document as received.
    pub grant_xml: String,
}

// ─── Rules ──────────────────────────────────────────────────────────────

/// Pick the folio `allocate` would return.
///
/// The candidate is `counter + 1`, skipping folios already claimed by
/// `reserve`. `None` when the candidate lies outside every open range.
pub fn next_folio(counter: u64, claimed_above: &BTreeSet<u64>, ranges: &[FolioRange]) -> Option<u64> {
    let mut candidate = counter.checked_add(1)?;
    while claimed_above.contains(&candidate) {
        candidate = candidate.checked_add(1)?;
    }
    ranges
        .iter()
        .any(|r| r.is_open() && r.contains(candidate))
        .then_some(candidate)
}

/// Whether `reserve(folio)` is allowed.
pub fn check_reservable(folio: u64, claimed: bool, ranges: &[FolioRange]) -> Result<(), FolioError> {
    if claimed {
        return Err(FolioError::FolioInUse { folio });
    }
    if !ranges.iter().any(|r| r.is_open() && r.contains(folio)) {
        return Err(FolioError::OutOfRange { folio });
    }
    Ok(())
}

/// Outcome of accepting a new range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantPlan {
    /// New counter value: `max(counter, start - 1)`.
    pub floor: u64,
    /// Open ranges that end at or below the new floor.
    pub retire: Vec<Uuid>,
}

/// Validate a new range against the key's state and compute its effect.
pub fn plan_grant(counter: u64, ranges: &[FolioRange], start: u64, end: u64) -> Result<GrantPlan, FolioError> {
    if start == 0 || start > end {
        return Err(FolioError::InvalidRange { start, end });
    }
    if end <= counter {
        return Err(FolioError::RangeBelowCounter { end, counter });
    }
    if let Some(open) = ranges
        .iter()
        .filter(|r| r.is_open())
        .find(|r| start <= r.end && r.start <= end)
    {
        return Err(FolioError::RangeOverlap {
            start,
            end,
            open_start: open.start,
            open_end: open.end,
        });
    }
    let floor = counter.max(start - 1);
    let retire = ranges
        .iter()
        .filter(|r| r.is_open() && r.end <= floor)
        .map(|r| r.id)
        .collect();
    Ok(GrantPlan { floor, retire })
}

// ─── FolioLedger ────────────────────────────────────────────────────────

/// Complete allocation state of one key.
#[derive(Debug, Clone)]
pub struct FolioLedger {
    key: FolioKey,
    counter: u64,
    ranges: Vec<FolioRange>,
    folios: BTreeMap<u64, IssuedFolio>,
}

impl FolioLedger {
    /// Empty ledger: counter at zero, no ranges.
    pub fn new(key: FolioKey) -> Self {
        Self {
            key,
            counter: 0,
            ranges: Vec::new(),
            folios: BTreeMap::new(),
        }
    }

    /// The ledger's key.
    pub fn key(&self) -> &FolioKey {
        &self.key
    }

    /// Highest folio handed out by `allocate` (or the grant floor).
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// All ranges, in grant order.
    pub fn ranges(&self) -> &[FolioRange] {
        &self.ranges
    }

    /// All claimed folios, ascending.
    pub fn issued(&self) -> impl Iterator<Item = &IssuedFolio> {
        self.folios.values()
    }

    /// Allocate the next folio.
    pub fn allocate(&mut self, now: DateTime<Utc>) -> Result<Folio, FolioError> {
        let claimed_above: BTreeSet<u64> = self
            .folios
            .range(self.counter.saturating_add(1)..)
            .map(|(f, _)| *f)
            .collect();
        let candidate = next_folio(self.counter, &claimed_above, &self.ranges)
            .ok_or_else(|| self.key.exhausted(self.counter))?;
        let folio = Folio::new(candidate)?;
        self.counter = candidate;
        self.folios.insert(
            candidate,
            IssuedFolio {
                folio,
                origin: FolioOrigin::Allocated,
                issued_at: now,
                void_reason: None,
                voided_at: None,
            },
        );
        for range in self.ranges.iter_mut() {
            if range.is_open() && range.end <= self.counter {
                range.status = RangeStatus::Exhausted;
            }
        }
        Ok(folio)
    }

    /// Claim a specific folio.
    pub fn reserve(&mut self, folio: Folio, now: DateTime<Utc>) -> Result<(), FolioError> {
        let value = folio.value();
        check_reservable(value, self.folios.contains_key(&value), &self.ranges)?;
        self.folios.insert(
            value,
            IssuedFolio {
                folio,
                origin: FolioOrigin::Reserved,
                issued_at: now,
                void_reason: None,
                voided_at: None,
            },
        );
        Ok(())
    }

    /// Flag a claimed folio as voided. Voiding twice keeps the first reason.
    pub fn release(&mut self, folio: Folio, reason: &str, now: DateTime<Utc>) -> Result<(), FolioError> {
        let entry = self
            .folios
            .get_mut(&folio.value())
            .ok_or(FolioError::NotIssued { folio: folio.value() })?;
        if entry.voided_at.is_none() {
            entry.void_reason = Some(reason.to_string());
            entry.voided_at = Some(now);
        }
        Ok(())
    }

    /// Accept a new range.
    pub fn grant(&mut self, grant: RangeGrant, now: DateTime<Utc>) -> Result<FolioRange, FolioError> {
        let plan = plan_grant(self.counter, &self.ranges, grant.start, grant.end)?;
        for range in self.ranges.iter_mut() {
            if plan.retire.contains(&range.id) {
                range.status = if range.end <= self.counter {
                    RangeStatus::Exhausted
                } else {
                    RangeStatus::Superseded
                };
            }
        }
        self.counter = plan.floor;
        let range = FolioRange {
            id: Uuid::new_v4(),
            start: grant.start,
            end: grant.end,
            grant_xml: grant.grant_xml,
            granted_at: now,
            status: RangeStatus::Open,
        };
        self.ranges.push(range.clone());
        Ok(range)
    }
}
