//! # Submission Batches
//!
//! A batch wraps one or more signed `<TaxDocument>`s under a cover sheet
//! and an enveloped signature over the whole set:
//!
//! ```text
//! <SubmissionBatch version="1.0">
//!   <SetData ID="SetDoc">
//!     <CoverSheet>
//!       <Sender>76086428-5</Sender><SignedAt>2026-03-02T10:00:00Z</SignedAt>
//!       <Subtotal count="2" kind="33"/><Subtotal count="1" kind="61"/>
//!     </CoverSheet>
//!     <TaxDocument version="1.0">..</TaxDocument>
//!     ..
//!   </SetData>
//!   <Signature>..</Signature>
//! </SubmissionBatch>
//! ```
//!
//! Documents are embedded exactly as signed; their folios and signatures
//! are untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dte_core::{CanonicalXml, DocumentKind, Folio, XmlElement};
use dte_crypto::{sign_enveloped, KeyMaterial};
use dte_document::{DocumentSummary, SIGNED_ROOT};

use crate::error::AuthorityError;

/// Root element name of a batch.
pub const BATCH_ROOT: &str = "SubmissionBatch";
/// `ID` of the signed set.
pub const SET_ID: &str = "SetDoc";

const BATCH_VERSION: &str = "1.0";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Signed documents being assembled into one upload.
#[derive(Debug, Clone, Default)]
pub struct SubmissionBatch {
    documents: Vec<(DocumentKind, Folio, XmlElement)>,
}

impl SubmissionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signed `<TaxDocument>`. Returns its kind and folio.
    pub fn push_signed(&mut self, signed_xml: &str) -> Result<(DocumentKind, Folio), AuthorityError> {
        let element = XmlElement::parse(signed_xml)?;
        if element.name() != SIGNED_ROOT {
            return Err(AuthorityError::InvalidBatch(format!(
                "expected <{SIGNED_ROOT}>, got <{}>",
                element.name()
            )));
        }
        let document = element
            .find("Document")
            .ok_or_else(|| AuthorityError::InvalidBatch("signed document has no <Document>".to_string()))?;
        let summary = DocumentSummary::from_element(document)
            .map_err(|e| AuthorityError::InvalidBatch(e.to_string()))?;
        if self
            .documents
            .iter()
            .any(|(k, f, _)| *k == summary.kind && *f == summary.folio)
        {
            return Err(AuthorityError::InvalidBatch(format!(
                "document {} folio {} added twice",
                summary.kind, summary.folio
            )));
        }
        self.documents.push((summary.kind, summary.folio, element));
        Ok((summary.kind, summary.folio))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Document count per kind, ordered by kind code.
    pub fn subtotals(&self) -> BTreeMap<u16, usize> {
        let mut counts = BTreeMap::new();
        for (kind, _, _) in &self.documents {
            *counts.entry(kind.code()).or_insert(0) += 1;
        }
        counts
    }

    /// Render the cover sheet and sign the set with `material`.
    pub fn seal(&self, material: &KeyMaterial, signed_at: DateTime<Utc>) -> Result<CanonicalXml, AuthorityError> {
        if self.documents.is_empty() {
            return Err(AuthorityError::InvalidBatch("batch is empty".to_string()));
        }
        let mut cover = XmlElement::new("CoverSheet")
            .text_child("Sender", material.certificate().subject_tax_id().as_str())
            .text_child("SignedAt", signed_at.format(TIME_FORMAT).to_string());
        for (kind, count) in self.subtotals() {
            cover.push(
                XmlElement::new("Subtotal")
                    .attr("kind", kind.to_string())
                    .attr("count", count.to_string()),
            );
        }
        let mut set = XmlElement::new("SetData").attr("ID", SET_ID).child(cover);
        for (_, _, element) in &self.documents {
            set.push(element.clone());
        }
        let root = XmlElement::new(BATCH_ROOT).attr("version", BATCH_VERSION);
        sign_enveloped(root, set, material).map_err(AuthorityError::SigningFailed)
    }
}
