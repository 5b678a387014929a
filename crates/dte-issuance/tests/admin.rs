//! Folio administration, batch submission, counterparty notices, and
//! background polling.

mod common;

use std::time::Duration;

use common::{acme, draft, grant_xml, harness, status, timeout, upload_ok};
use dte_core::{AccountId, DocumentId, DocumentKind, ErrorKind, Folio};
use dte_folio::FolioGap;
use dte_issuance::{spawn_status_poller, IssuanceError};
use dte_state::{CounterpartyResponse, SubmissionState};

/// Issue one invoice whose upload times out three times.
async fn failed_invoice(h: &common::Harness) -> DocumentId {
    for _ in 0..3 {
        h.api.on_upload(timeout());
    }
    match h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await {
        Err(IssuanceError::SubmissionFailed { document_id, .. }) => document_id,
        other => panic!("expected a submission failure, got {other:?}"),
    }
}

// ── Ranges and voids ─────────────────────────────────────────────────

#[tokio::test]
async fn grant_must_match_declared_range() {
    let h = harness().await;
    let err = h
        .service
        .grant_folio_range(
            &acme(),
            DocumentKind::Invoice,
            200,
            299,
            &grant_xml(DocumentKind::Invoice, 200, 250),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .service
        .grant_folio_range(&acme(), DocumentKind::Receipt, 1, 50, &grant_xml(DocumentKind::Invoice, 1, 50))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .service
        .grant_folio_range(&acme(), DocumentKind::Invoice, 200, 299, "<NotAGrant/>")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn grant_for_another_taxpayer_is_refused() {
    let h = harness().await;
    let foreign = "<Grant><Issuer>11111111-1</Issuer><Kind>33</Kind><From>200</From><To>299</To></Grant>";
    let err = h
        .service
        .grant_folio_range(&acme(), DocumentKind::Invoice, 200, 299, foreign)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.service.folio_ranges(&acme(), DocumentKind::Invoice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn grant_naming_a_taxpayer_needs_loadable_credentials() {
    let h = harness().await;
    let globex = AccountId::new("globex").unwrap();
    let err = h
        .service
        .grant_folio_range(&globex, DocumentKind::Invoice, 1, 50, &grant_xml(DocumentKind::Invoice, 1, 50))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Credential);
    assert!(h.service.folio_ranges(&globex, DocumentKind::Invoice).await.unwrap().is_empty());

    let anonymous = "<Grant><Kind>33</Kind><From>1</From><To>50</To></Grant>";
    h.service
        .grant_folio_range(&globex, DocumentKind::Invoice, 1, 50, anonymous)
        .await
        .unwrap();
}

#[tokio::test]
async fn void_requires_reason_and_an_issued_folio() {
    let h = harness().await;
    h.api.on_upload(upload_ok("T-1"));
    let issued = h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();

    let err = h
        .service
        .void_folio(&acme(), DocumentKind::Invoice, issued.folio, "   ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .service
        .void_folio(&acme(), DocumentKind::Invoice, Folio::new(150).unwrap(), "typo")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    h.service
        .void_folio(&acme(), DocumentKind::Invoice, issued.folio, "duplicate sale")
        .await
        .unwrap();
    let folios = h.stores.folios.issued(&acme(), DocumentKind::Invoice).await.unwrap();
    assert_eq!(folios[0].void_reason.as_deref(), Some("duplicate sale"));
    assert!(h.service.folio_gaps(&acme(), DocumentKind::Invoice).await.unwrap().is_empty());
}

#[tokio::test]
async fn gaps_report_unissued_folios_between_claims() {
    let h = harness().await;
    h.stores
        .folios
        .reserve(&acme(), DocumentKind::Invoice, Folio::new(105).unwrap())
        .await
        .unwrap();
    h.api.on_upload(upload_ok("T-1"));
    h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();

    let gaps = h.service.folio_gaps(&acme(), DocumentKind::Invoice).await.unwrap();
    assert_eq!(gaps, vec![FolioGap { first: 101, last: 104 }]);
}

// ── Batches ──────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_shares_tracking_id_and_fans_out_status() {
    let h = harness().await;
    let a = failed_invoice(&h).await;
    let b = failed_invoice(&h).await;

    h.api.on_upload(upload_ok("T-9"));
    let records = h.service.submit_batch(&[a, b]).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.state, SubmissionState::Sent);
        assert_eq!(record.tracking_id.as_ref().map(|t| t.as_str()), Some("T-9"));
    }

    h.api.on_status(status("T-9", "EPR", &[(100, "DOK"), (101, "DNK")]));
    let outcome = h.service.check_status(a, false).await.unwrap();
    assert_eq!(outcome.state, SubmissionState::Accepted);

    // One query answered both documents.
    let other = h.service.check_status(b, false).await.unwrap();
    assert_eq!(other.state, SubmissionState::Rejected);
    assert_eq!(h.api.status_queries(), 1);
}

#[tokio::test]
async fn batch_refuses_sent_documents_and_duplicates() {
    let h = harness().await;
    let failed = failed_invoice(&h).await;
    h.api.on_upload(upload_ok("T-1"));
    let sent = h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();

    let err = h.service.submit_batch(&[failed, sent.document_id]).await.unwrap_err();
    assert!(matches!(err, IssuanceError::InvalidState { operation: "batch submission", .. }));

    let err = h.service.submit_batch(&[failed, failed]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h.service.submit_batch(&[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h.service.submit_batch(&[DocumentId::new()]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ── Counterparty notices ─────────────────────────────────────────────

#[tokio::test]
async fn acceptance_notice_is_recorded_beside_the_outcome() {
    let h = harness().await;
    h.api.on_upload(upload_ok("T-1"));
    let issued = h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();

    let notice = "<AcceptanceNotice><Issuer>76.086.428-5</Issuer><Kind>33</Kind><Folio>100</Folio>\
                  <Code>2</Code><Detail>wrong price</Detail></AcceptanceNotice>";
    let record = h.service.ingest_acceptance_notice(notice).await.unwrap();
    assert_eq!(record.document_id, issued.document_id);
    assert_eq!(record.state, SubmissionState::Sent);
    let counterparty = record.counterparty.unwrap();
    assert_eq!(counterparty.response, CounterpartyResponse::Rejected);
    assert_eq!(counterparty.detail, "wrong price");
}

#[tokio::test]
async fn unmatched_notice_is_not_found() {
    let h = harness().await;
    h.api.on_upload(upload_ok("T-1"));
    h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();

    let other_issuer = "<AcceptanceNotice><Issuer>11111111-1</Issuer><Kind>33</Kind><Folio>100</Folio>\
                        <Code>0</Code></AcceptanceNotice>";
    let err = h.service.ingest_acceptance_notice(other_issuer).await.unwrap_err();
    assert!(matches!(err, IssuanceError::UnmatchedNotice { .. }));

    let err = h
        .service
        .ingest_acceptance_notice("<AcceptanceNotice><Issuer>76086428-5</Issuer><Kind>33</Kind><Folio>100</Folio><Code>7</Code></AcceptanceNotice>")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

// ── Polling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn poll_queries_each_tracking_id_once() {
    let h = harness().await;
    h.api.on_upload(upload_ok("T-1"));
    h.api.on_upload(upload_ok("T-2"));
    let first = h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();
    let second = h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();

    h.api.on_status(status("T-1", "EPR", &[(100, "DOK")]));
    h.api.on_status(status("T-2", "RPR", &[]));
    assert_eq!(h.service.poll_in_flight().await.unwrap(), 2);
    assert_eq!(h.api.status_queries(), 2);

    let first = h.service.get_submission(first.document_id).await.unwrap();
    let second = h.service.get_submission(second.document_id).await.unwrap();
    assert_eq!(first.state, SubmissionState::Accepted);
    assert_eq!(second.state, SubmissionState::AcceptedWithDiscrepancies);

    // Nothing is in flight any more.
    assert_eq!(h.service.poll_in_flight().await.unwrap(), 0);
}

#[tokio::test]
async fn background_poller_reconciles_in_flight_documents() {
    let h = harness().await;
    h.api.on_upload(upload_ok("T-1"));
    let issued = h.service.issue(&acme(), &draft(DocumentKind::Invoice)).await.unwrap();
    h.api.on_status(status("T-1", "EPR", &[(100, "DOK")]));

    let poller = spawn_status_poller(h.service.clone(), Duration::from_millis(10));
    let mut state = SubmissionState::Sent;
    for _ in 0..100 {
        state = h.service.get_submission(issued.document_id).await.unwrap().state;
        if state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    poller.abort();
    assert_eq!(state, SubmissionState::Accepted);
    assert_eq!(h.api.status_queries(), 1);
}
