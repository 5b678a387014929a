//! # Document Signer
//!
//! Wraps a [`DocumentEnvelope`] in a `<TaxDocument version="1.0">` root and
//! applies an enveloped signature over its `<Document>` element.
//!
//! Certificate validity is checked against the document's issue date, not
//! the wall clock, so signing the same envelope with the same material is
//! reproducible.

use dte_core::{CanonicalXml, XmlElement};
use dte_crypto::{sign_enveloped, verify_enveloped, Certificate, KeyMaterial};

use crate::envelope::{DocumentEnvelope, DocumentSummary};
use crate::error::DocumentError;

/// Root element name of a signed document.
pub const SIGNED_ROOT: &str = "TaxDocument";
/// Schema version attribute of the signed root.
pub const SCHEMA_VERSION: &str = "1.0";

/// An envelope together with its signed XML. Immutable.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    envelope: DocumentEnvelope,
    signed: CanonicalXml,
    certificate_serial: String,
}

impl SignedDocument {
    /// The unsigned envelope.
    pub fn envelope(&self) -> &DocumentEnvelope {
        &self.envelope
    }

    /// The signed `<TaxDocument>` XML.
    pub fn signed_xml(&self) -> &CanonicalXml {
        &self.signed
    }

    /// Serial of the certificate that signed the document.
    pub fn certificate_serial(&self) -> &str {
        &self.certificate_serial
    }

    /// The `<TaxDocument>` element tree, for embedding in a batch.
    pub fn to_element(&self) -> Result<XmlElement, DocumentError> {
        Ok(XmlElement::parse(self.signed.as_str())?)
    }
}

/// The empty signed root every document is wrapped in.
pub fn signed_root() -> XmlElement {
    XmlElement::new(SIGNED_ROOT).attr("version", SCHEMA_VERSION)
}

/// Sign `envelope` with `material`.
///
/// Fails with `KeyMaterialExpired` if the leaf certificate is not valid on
/// the envelope's issue date.
pub fn sign_document(
    envelope: DocumentEnvelope,
    material: &KeyMaterial,
) -> Result<SignedDocument, DocumentError> {
    material.ensure_valid_on(envelope.issue_date)?;
    let signed = sign_enveloped(signed_root(), envelope.to_element(), material)?;
    tracing::info!(
        account = %envelope.account,
        kind = %envelope.kind,
        folio = %envelope.folio,
        certificate = material.certificate().serial(),
        "signed document"
    );
    Ok(SignedDocument {
        certificate_serial: material.certificate().serial().to_string(),
        envelope,
        signed,
    })
}

/// A signed document that passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedDocument {
    /// Identification read from the signed content.
    pub summary: DocumentSummary,
    /// Leaf certificate that signed it.
    pub signer: Certificate,
}

/// Verify a signed document against a trust anchor.
///
/// Checks the enveloped signature, the certificate chain, and that the
/// signing certificate was valid on the document's issue date.
pub fn verify_document(signed_xml: &str, anchor: &Certificate) -> Result<VerifiedDocument, DocumentError> {
    let verified = verify_enveloped(signed_xml, &signed_root(), anchor)?;
    if verified.content.name() != "Document" {
        return Err(DocumentError::Malformed(format!(
            "signed content is <{}>, expected <Document>",
            verified.content.name()
        )));
    }
    let summary = DocumentSummary::from_element(&verified.content)?;
    let signer = verified.chain.leaf().clone();
    signer.check_valid_on(summary.issue_date)?;
    Ok(VerifiedDocument { summary, signer })
}

/// `true` iff [`verify_document`] succeeds.
pub fn verify(signed_xml: &str, anchor: &Certificate) -> bool {
    match verify_document(signed_xml, anchor) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "document verification failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::tests::sample_draft;
    use crate::envelope::canonicalize;
    use crate::totals::TaxRate;
    use chrono::{NaiveDate, TimeZone, Utc};
    use dte_core::{AccountId, Folio, TaxId};
    use dte_crypto::{CertificateChain, CertificateFields, CryptoError, SigningKey};

    fn material(valid_until_year: i32) -> (KeyMaterial, Certificate) {
        let ca_key = SigningKey::generate();
        let ca = Certificate::self_signed(
            CertificateFields {
                serial: "1".to_string(),
                subject_name: "Test CA".to_string(),
                subject_tax_id: TaxId::new("60803000-K").unwrap(),
                issuer_name: "Test CA".to_string(),
                not_before: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                not_after: Utc.with_ymd_and_hms(2035, 1, 1, 0, 0, 0).unwrap(),
                public_key: ca_key.public_key(),
            },
            &ca_key,
        )
        .unwrap();
        let key = SigningKey::generate();
        let leaf = Certificate::issue(
            CertificateFields {
                serial: "4242".to_string(),
                subject_name: "Acme SpA".to_string(),
                subject_tax_id: TaxId::new("76086428-5").unwrap(),
                issuer_name: "Test CA".to_string(),
                not_before: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                not_after: Utc.with_ymd_and_hms(valid_until_year, 12, 31, 0, 0, 0).unwrap(),
                public_key: key.public_key(),
            },
            &ca_key,
        )
        .unwrap();
        let chain = CertificateChain::new(vec![leaf, ca.clone()]).unwrap();
        (
            KeyMaterial::new(AccountId::new("acme").unwrap(), key, chain).unwrap(),
            ca,
        )
    }

    fn envelope() -> DocumentEnvelope {
        canonicalize(
            &AccountId::new("acme").unwrap(),
            &sample_draft(),
            Folio::new(100).unwrap(),
            TaxRate::STANDARD,
        )
        .unwrap()
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let (material, ca) = material(2027);
        let signed = sign_document(envelope(), &material).unwrap();
        assert!(signed.signed_xml().as_str().starts_with("<TaxDocument version=\"1.0\"><Document ID=\"K33F100\">"));
        let verified = verify_document(signed.signed_xml().as_str(), &ca).unwrap();
        assert_eq!(verified.summary.folio.value(), 100);
        assert_eq!(verified.signer.serial(), "4242");
        assert!(verify(signed.signed_xml().as_str(), &ca));
    }

    #[test]
    fn expired_certificate_checked_against_issue_date() {
        let (material, _) = material(2025);
        // sample issue date is 2026-03-02, after the certificate expires
        let err = sign_document(envelope(), &material).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Crypto(CryptoError::KeyMaterialExpired { .. })
        ));

        let mut early = envelope();
        early.issue_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(sign_document(early, &material).is_ok());
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let (material, ca) = material(2027);
        let signed = sign_document(envelope(), &material).unwrap();
        let tampered = signed
            .signed_xml()
            .as_str()
            .replace("<Total>16900</Total>", "<Total>16000</Total>");
        assert!(!verify(&tampered, &ca));
    }

    #[test]
    fn any_byte_mutation_fails_verification() {
        let (material, ca) = material(2027);
        let signed = sign_document(envelope(), &material).unwrap();
        let bytes = signed.signed_xml().as_bytes();
        // Every 7th byte keeps the test quick while touching every region.
        for i in (0..bytes.len()).step_by(7) {
            let mut mutated = bytes.to_vec();
            mutated[i] = if mutated[i] == b'x' { b'y' } else { b'x' };
            let text = String::from_utf8(mutated).unwrap();
            assert!(!verify(&text, &ca), "mutation at byte {i} verified");
        }
    }

    #[test]
    fn signed_element_embeds_in_batches() {
        let (material, _) = material(2027);
        let signed = sign_document(envelope(), &material).unwrap();
        let element = signed.to_element().unwrap();
        assert_eq!(CanonicalXml::render(&element).unwrap(), *signed.signed_xml());
    }
}
