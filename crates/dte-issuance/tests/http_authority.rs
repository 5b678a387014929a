//! The full pipeline over HTTP: credentials from disk, the `reqwest`
//! client against a mock Authority.
//!
//! | Method | Path          | Answer                         |
//! |--------|---------------|--------------------------------|
//! | GET    | `/auth/seed`  | seed `031786`                  |
//! | POST   | `/auth/token` | token `TKN-1`                  |
//! | POST   | `/dte/upload` | code `0`, tracking id `8841`   |
//! | GET    | `/dte/status` | batch `EPR`, document `DOK`    |

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::{acme, draft, grant_xml};
use dte_authority::{AuthorityConfig, HttpAuthorityClient};
use dte_core::{CanonicalXml, DocumentKind, ManualClock};
use dte_crypto::FileCredentialStore;
use dte_issuance::{IssuanceConfig, IssuanceMetrics, IssuanceService, IssuanceStores};
use dte_state::SubmissionState;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

async fn mock_authority() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/seed"))
        .respond_with(xml("<SeedResponse><Status>00</Status><Seed>031786</Seed></SeedResponse>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(xml(
            "<TokenResponse><Status>00</Status><Token>TKN-1</Token></TokenResponse>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dte/upload"))
        .and(header("cookie", "TOKEN=TKN-1"))
        .respond_with(xml(
            "<UploadAck><Status>0</Status><TrackId>8841</TrackId></UploadAck>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dte/status"))
        .and(query_param("trackid", "8841"))
        .respond_with(xml(
            "<BatchStatus><TrackId>8841</TrackId><Status>EPR</Status>\
             <Document kind=\"33\" folio=\"100\"><Status>DOK</Status></Document></BatchStatus>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    server
}

/// Write `acme`'s key and chain where `FileCredentialStore` expects them.
fn write_credentials(root: &std::path::Path) {
    let (material, _) = common::material();
    let dir = root.join("acme");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(FileCredentialStore::KEY_FILE), "02".repeat(32)).unwrap();
    let chain = CanonicalXml::render(&material.chain().to_xml()).unwrap();
    std::fs::write(dir.join(FileCredentialStore::CHAIN_FILE), chain.as_str()).unwrap();
}

#[tokio::test]
async fn issue_and_reconcile_over_http() {
    let server = mock_authority().await;
    let credentials_dir = tempfile::tempdir().unwrap();
    write_credentials(credentials_dir.path());

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap());
    let credentials = Arc::new(FileCredentialStore::new(credentials_dir.path()));
    let stores = IssuanceStores::in_memory(credentials, Arc::new(clock.clone()));
    let authority = AuthorityConfig::new(server.uri());
    let api = Arc::new(HttpAuthorityClient::new(authority.clone()).unwrap());
    let service = IssuanceService::new(
        stores,
        api,
        &authority,
        IssuanceConfig::default(),
        Arc::new(clock),
        IssuanceMetrics::new().unwrap(),
    );
    service
        .grant_folio_range(&acme(), DocumentKind::Invoice, 100, 199, &grant_xml(DocumentKind::Invoice, 100, 199))
        .await
        .unwrap();

    let issued = service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();
    assert_eq!(issued.state, SubmissionState::Sent);
    assert_eq!(issued.tracking_id.as_ref().map(|t| t.as_str()), Some("8841"));

    let outcome = service.check_status(issued.document_id, false).await.unwrap();
    assert_eq!(outcome.state, SubmissionState::Accepted);

    // Terminal now: answered without another request.
    let again = service.check_status(issued.document_id, false).await.unwrap();
    assert_eq!(again, outcome);
}
