//! # dte-document — Document Canonicalizer and Signer
//!
//! - [`draft`]: what the business layer submits (`DocumentDraft`,
//!   `LineItem`, `Party`, `Reference`) and its structural validation.
//! - [`totals`]: net/exempt buckets, half-up tax, grand total.
//! - [`envelope`]: numbering plus deterministic canonical XML.
//! - [`sign`]: enveloped signature with the account's key material, and
//!   verification against a trust anchor.
//!
//! A document is immutable once signed; a correction is a new document
//! whose `Reference` points at the original.

pub mod draft;
pub mod envelope;
pub mod error;
pub mod sign;
pub mod totals;

pub use draft::{DocumentDraft, LineItem, Party, Reference, ReferenceReason};
pub use envelope::{canonicalize, document_ref, DocumentEnvelope, DocumentSummary};
pub use error::DocumentError;
pub use sign::{
    sign_document, signed_root, verify, verify_document, SignedDocument, VerifiedDocument, SCHEMA_VERSION,
    SIGNED_ROOT,
};
pub use totals::{TaxRate, Totals};
