//! Shared key material and drafts for subcommand tests.

use chrono::{NaiveDate, TimeZone, Utc};
use dte_core::{AccountId, CanonicalXml, DocumentKind, Folio, TaxId};
use dte_crypto::{Certificate, CertificateChain, CertificateFields, KeyMaterial, SigningKey};
use dte_document::{canonicalize, sign_document, DocumentDraft, LineItem, Party, TaxRate};

pub fn acme() -> AccountId {
    AccountId::new("acme").unwrap()
}

/// Acme's key material and the CA certificate that anchors it.
pub fn material() -> (KeyMaterial, Certificate) {
    let ca_key = SigningKey::from_seed(&[1u8; 32]);
    let ca = Certificate::self_signed(
        CertificateFields {
            serial: "1".to_string(),
            subject_name: "Test CA".to_string(),
            subject_tax_id: TaxId::new("60803000-K").unwrap(),
            issuer_name: "Test CA".to_string(),
            not_before: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            public_key: ca_key.public_key(),
        },
        &ca_key,
    )
    .unwrap();
    let key = SigningKey::from_seed(&[2u8; 32]);
    let leaf = Certificate::issue(
        CertificateFields {
            serial: "200".to_string(),
            subject_name: "Acme SpA".to_string(),
            subject_tax_id: TaxId::new("76086428-5").unwrap(),
            issuer_name: "Test CA".to_string(),
            not_before: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2028, 1, 1, 0, 0, 0).unwrap(),
            public_key: key.public_key(),
        },
        &ca_key,
    )
    .unwrap();
    let chain = CertificateChain::new(vec![leaf, ca.clone()]).unwrap();
    (KeyMaterial::new(acme(), key, chain).unwrap(), ca)
}

pub fn draft() -> DocumentDraft {
    DocumentDraft {
        kind: DocumentKind::Invoice,
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        issuer: Party {
            tax_id: TaxId::new("76086428-5").unwrap(),
            name: "Acme SpA".to_string(),
            address: None,
        },
        receiver: Party {
            tax_id: TaxId::new("11111111-1").unwrap(),
            name: "Cliente Ltda".to_string(),
            address: None,
        },
        lines: vec![LineItem {
            description: "Consulting".to_string(),
            quantity: 2,
            unit_price: 5_000,
            exempt: false,
        }],
        references: Vec::new(),
        declared_totals: None,
    }
}

/// Signed folio 100 and the anchor certificate as XML text.
pub fn signed_document() -> (String, String) {
    let (material, ca) = material();
    let envelope = canonicalize(&acme(), &draft(), Folio::new(100).unwrap(), TaxRate::STANDARD).unwrap();
    let signed = sign_document(envelope, &material).unwrap();
    let anchor = CanonicalXml::render(&ca.to_xml()).unwrap();
    (signed.signed_xml().as_str().to_string(), anchor.into_string())
}
