#![allow(dead_code)]

use chrono::{NaiveDate, TimeZone, Utc};
use dte_core::{AccountId, DocumentKind, Folio, TaxId};
use dte_crypto::{Certificate, CertificateChain, CertificateFields, KeyMaterial, SigningKey};
use dte_document::{canonicalize, sign_document, DocumentDraft, LineItem, Party, TaxRate};

pub fn acme() -> AccountId {
    AccountId::new("acme").unwrap()
}

/// Key material for `acme` issued by a throwaway CA. Returns the CA
/// certificate as trust anchor.
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

pub fn draft(kind: DocumentKind) -> DocumentDraft {
    DocumentDraft {
        kind,
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
            quantity: 1,
            unit_price: 10_000,
            exempt: false,
        }],
        references: Vec::new(),
        declared_totals: None,
    }
}

/// A signed invoice with the given folio, as stored XML.
pub fn signed_invoice(material: &KeyMaterial, folio: u64) -> String {
    let envelope = canonicalize(
        &acme(),
        &draft(DocumentKind::Invoice),
        Folio::new(folio).unwrap(),
        TaxRate::STANDARD,
    )
    .unwrap();
    sign_document(envelope, material)
        .unwrap()
        .signed_xml()
        .as_str()
        .to_string()
}
