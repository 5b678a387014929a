//! # dte-core — Foundational Types for the DTE Stack
//!
//! Every other crate in the workspace depends on `dte-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `AccountId`, `TaxId`,
//!    `Folio`, `TrackingId`, `DocumentId`; no bare strings or integers
//!    for identifiers.
//!
//! 2. **`CanonicalXml` newtype.** Every byte sequence that is digested or
//!    signed flows through `CanonicalXml::render()`. Field order is the
//!    order of construction, attributes are sorted, no incidental
//!    whitespace is emitted.
//!
//! 3. **Single `DocumentKind` enum.** Exhaustive `match` everywhere the
//!    Authority's numeric kind codes are interpreted.
//!
//! 4. **One error taxonomy.** [`ErrorKind`] is the machine-readable
//!    classification every crate-level error maps into.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dte-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod clock;
pub mod digest;
pub mod error;
pub mod identity;
pub mod kind;

pub use canonical::{CanonicalXml, XmlElement, XmlNode};
pub use clock::{Clock, ManualClock, SystemClock};
pub use digest::{sha256, Sha256Digest};
pub use error::{ErrorKind, ValidationError, XmlError};
pub use identity::{AccountId, DocumentId, Folio, TaxId, TrackingId};
pub use kind::DocumentKind;
