//! Batch sealing keeps embedded documents intact.

mod common;

use chrono::{TimeZone, Utc};
use dte_authority::{AuthorityError, SubmissionBatch};
use dte_core::{CanonicalXml, XmlElement};
use dte_crypto::verify_enveloped;
use dte_document::verify_document;

#[test]
fn cover_sheet_counts_per_kind_and_documents_still_verify() {
    let (material, ca) = common::material();
    let mut batch = SubmissionBatch::new();
    for folio in [100, 101, 102] {
        batch.push_signed(&common::signed_invoice(&material, folio)).unwrap();
    }
    let sealed = batch
        .seal(&material, Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap())
        .unwrap();

    let root = XmlElement::new("SubmissionBatch").attr("version", "1.0");
    let verified = verify_enveloped(sealed.as_str(), &root, &ca).unwrap();
    let cover = verified.content.find("CoverSheet").unwrap();
    assert_eq!(cover.child_text("Sender").as_deref(), Some("76086428-5"));
    let subtotal = cover.find("Subtotal").unwrap();
    assert_eq!(subtotal.attribute("kind"), Some("33"));
    assert_eq!(subtotal.attribute("count"), Some("3"));

    let embedded: Vec<_> = verified.content.find_all("TaxDocument").collect();
    assert_eq!(embedded.len(), 3);
    for (doc, folio) in embedded.into_iter().zip([100u64, 101, 102]) {
        let xml = CanonicalXml::render(doc).unwrap();
        assert_eq!(xml.as_str(), common::signed_invoice(&material, folio));
        let v = verify_document(xml.as_str(), &ca).unwrap();
        assert_eq!(v.summary.folio.value(), folio);
    }
}

#[test]
fn duplicate_document_rejected() {
    let (material, _) = common::material();
    let signed = common::signed_invoice(&material, 100);
    let mut batch = SubmissionBatch::new();
    batch.push_signed(&signed).unwrap();
    let err = batch.push_signed(&signed).unwrap_err();
    assert!(matches!(err, AuthorityError::InvalidBatch(_)));
}

#[test]
fn empty_batch_cannot_be_sealed() {
    let (material, _) = common::material();
    let err = SubmissionBatch::new().seal(&material, Utc::now()).unwrap_err();
    assert!(matches!(err, AuthorityError::InvalidBatch(_)));
}

#[test]
fn non_document_rejected() {
    let mut batch = SubmissionBatch::new();
    let err = batch.push_signed("<Invoice/>").unwrap_err();
    assert!(matches!(err, AuthorityError::InvalidBatch(_)));
}
