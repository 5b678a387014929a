#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use dte_authority::response::{parse_status, parse_upload};
use dte_authority::{
    AuthorityApi, AuthorityConfig, AuthorityError, SeedResponse, StatusReport, TokenGrant, UploadReceipt,
};
use dte_core::{AccountId, CanonicalXml, DocumentKind, ManualClock, TaxId, TrackingId};
use dte_crypto::{Certificate, CertificateChain, CertificateFields, KeyMaterial, MemoryCredentialStore, SigningKey};
use dte_document::{DocumentDraft, LineItem, Party};
use dte_issuance::{IssuanceConfig, IssuanceMetrics, IssuanceService, IssuanceStores};

pub fn acme() -> AccountId {
    AccountId::new("acme").unwrap()
}

/// Key material for `acme` issued by a throwaway CA, plus the CA
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
        lines: vec![
            LineItem {
                description: "Consulting".to_string(),
                quantity: 1,
                unit_price: 10_000,
                exempt: false,
            },
            LineItem {
                description: "Training".to_string(),
                quantity: 1,
                unit_price: 5_000,
                exempt: true,
            },
        ],
        references: Vec::new(),
        declared_totals: None,
    }
}

pub fn grant_xml(kind: DocumentKind, from: u64, to: u64) -> String {
    format!(
        "<Grant><Issuer>76086428-5</Issuer><Kind>{}</Kind><From>{from}</From><To>{to}</To></Grant>",
        kind.code()
    )
}

pub fn upload_ok(tracking_id: &str) -> Result<UploadReceipt, AuthorityError> {
    parse_upload(&format!(
        "<UploadAck><Status>0</Status><TrackId>{tracking_id}</TrackId></UploadAck>"
    ))
}

pub fn upload_rejected(code: &str) -> Result<UploadReceipt, AuthorityError> {
    parse_upload(&format!("<UploadAck><Status>{code}</Status></UploadAck>"))
}

pub fn timeout() -> Result<UploadReceipt, AuthorityError> {
    Err(AuthorityError::Timeout {
        endpoint: "upload".to_string(),
    })
}

/// A batch status body: batch code plus `(folio, code)` invoice entries.
pub fn status(tracking_id: &str, batch_code: &str, documents: &[(u64, &str)]) -> Result<StatusReport, AuthorityError> {
    let entries: String = documents
        .iter()
        .map(|(folio, code)| format!("<Document kind=\"33\" folio=\"{folio}\"><Status>{code}</Status></Document>"))
        .collect();
    parse_status(&format!(
        "<BatchStatus><TrackId>{tracking_id}</TrackId><Status>{batch_code}</Status>{entries}</BatchStatus>"
    ))
}

/// An Authority that answers uploads and status queries from scripts.
#[derive(Default)]
pub struct ScriptedAuthority {
    uploads: Mutex<VecDeque<Result<UploadReceipt, AuthorityError>>>,
    statuses: Mutex<VecDeque<Result<StatusReport, AuthorityError>>>,
    bodies: Mutex<Vec<String>>,
    pub seeds: AtomicU32,
    pub upload_calls: AtomicU32,
    pub status_calls: AtomicU32,
}

impl ScriptedAuthority {
    pub fn on_upload(&self, answer: Result<UploadReceipt, AuthorityError>) {
        self.uploads.lock().unwrap().push_back(answer);
    }

    pub fn on_status(&self, answer: Result<StatusReport, AuthorityError>) {
        self.statuses.lock().unwrap().push_back(answer);
    }

    /// Every uploaded batch, in order.
    pub fn uploaded_bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorityApi for ScriptedAuthority {
    async fn fetch_seed(&self) -> Result<SeedResponse, AuthorityError> {
        let n = self.seeds.fetch_add(1, Ordering::SeqCst);
        Ok(SeedResponse {
            seed: format!("{n:06}"),
        })
    }

    async fn exchange_token(&self, _signed_seed: &CanonicalXml) -> Result<TokenGrant, AuthorityError> {
        Ok(TokenGrant {
            token: "TOKEN".to_string(),
            lifetime_secs: None,
        })
    }

    async fn upload(&self, _token: &str, batch: &CanonicalXml) -> Result<UploadReceipt, AuthorityError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(batch.as_str().to_string());
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted upload")
    }

    async fn query_status(&self, _token: &str, tracking_id: &TrackingId) -> Result<StatusReport, AuthorityError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted status query");
        if let Ok(report) = &answer {
            assert_eq!(&report.tracking_id, tracking_id);
        }
        answer
    }
}

pub struct Harness {
    pub service: Arc<IssuanceService>,
    pub api: Arc<ScriptedAuthority>,
    pub stores: IssuanceStores,
    pub clock: ManualClock,
    pub anchor: Certificate,
}

/// A service for `acme` with range [100, 199] of invoices granted.
pub async fn harness() -> Harness {
    harness_with_range(100, 199).await
}

pub async fn harness_with_range(from: u64, to: u64) -> Harness {
    harness_with(from, to, IssuanceConfig::default()).await
}

pub async fn harness_with(from: u64, to: u64, config: IssuanceConfig) -> Harness {
    let (material, anchor) = material();
    let credentials = Arc::new(MemoryCredentialStore::new());
    credentials.insert(material);
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap());
    let stores = IssuanceStores::in_memory(credentials, Arc::new(clock.clone()));
    let api = Arc::new(ScriptedAuthority::default());

    let mut authority = AuthorityConfig::new("http://authority.test");
    authority.base_backoff_ms = 1;
    let service = Arc::new(IssuanceService::new(
        stores.clone(),
        api.clone(),
        &authority,
        config,
        Arc::new(clock.clone()),
        IssuanceMetrics::new().unwrap(),
    ));
    service
        .grant_folio_range(&acme(), DocumentKind::Invoice, from, to, &grant_xml(DocumentKind::Invoice, from, to))
        .await
        .unwrap();
    Harness {
        service,
        api,
        stores,
        clock,
        anchor,
    }
}
