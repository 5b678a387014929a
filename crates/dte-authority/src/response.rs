//! # Authority Response Parsers
//!
//! One parser per response shape, each producing a typed value. The root
//! element name is the tag: [`AuthorityResponse::parse`] dispatches on it,
//! and the per-family functions refuse a body with the wrong root.
//!
//! ```text
//! <SeedResponse><Status>00</Status><Seed>..</Seed></SeedResponse>
//! <TokenResponse><Status>00</Status><Token>..</Token><Lifetime>3000</Lifetime></TokenResponse>
//! <UploadAck><Status>0</Status><TrackId>..</TrackId><Detail>..</Detail></UploadAck>
//! <BatchStatus><TrackId>..</TrackId><Status>EPR</Status>
//!   <Document kind="33" folio="100"><Status>DOK</Status></Document>
//! </BatchStatus>
//! <AcceptanceNotice><Issuer>..</Issuer><Kind>33</Kind><Folio>100</Folio><Code>0</Code></AcceptanceNotice>
//! ```
//!
//! Unknown codes and malformed bodies are logged with the raw payload and
//! returned as errors.

use dte_core::{DocumentKind, Folio, TaxId, TrackingId, XmlElement};
use dte_state::{CounterpartyResponse, Outcome};

use crate::codes::{self, CodeFamily};
use crate::error::AuthorityError;

/// Status value the seed and token endpoints use for success.
const HANDSHAKE_OK: &str = "00";

/// A seed handed out by the Authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResponse {
    pub seed: String,
}

/// A bearer token and its declared lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub lifetime_secs: Option<u64>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token", &"[REDACTED]")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish()
    }
}

/// Synchronous answer to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// `Sent` or `Rejected`.
    pub outcome: Outcome,
    /// Present exactly when the outcome is `Sent`.
    pub tracking_id: Option<TrackingId>,
}

/// Status of one document inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStatus {
    pub kind: DocumentKind,
    pub folio: Folio,
    pub outcome: Outcome,
}

/// Asynchronous answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub tracking_id: TrackingId,
    /// Batch-level outcome.
    pub batch: Outcome,
    /// Per-document outcomes, when the Authority has them.
    pub documents: Vec<DocumentStatus>,
}

impl StatusReport {
    /// The outcome for one document: its own entry if present, otherwise
    /// the batch-level outcome.
    pub fn outcome_for(&self, kind: DocumentKind, folio: Folio) -> Outcome {
        self.documents
            .iter()
            .find(|d| d.kind == kind && d.folio == folio)
            .map(|d| d.outcome.clone())
            .unwrap_or_else(|| self.batch.clone())
    }
}

/// A counterparty's verdict on a document it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceNotice {
    pub issuer: TaxId,
    pub kind: DocumentKind,
    pub folio: Folio,
    pub response: CounterpartyResponse,
    pub code: String,
    pub detail: String,
}

/// Any Authority response, tagged by its root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityResponse {
    Seed(SeedResponse),
    Token(TokenGrant),
    Upload(UploadReceipt),
    Status(StatusReport),
    Acceptance(AcceptanceNotice),
}

impl AuthorityResponse {
    /// Parse a body of any family.
    pub fn parse(payload: &str) -> Result<Self, AuthorityError> {
        let root = parse_root("response", payload)?;
        match root.name() {
            "SeedResponse" => seed_from(&root, payload).map(Self::Seed),
            "TokenResponse" => token_from(&root, payload).map(Self::Token),
            "UploadAck" => upload_from(&root, payload).map(Self::Upload),
            "BatchStatus" => status_from(&root, payload).map(Self::Status),
            "AcceptanceNotice" => acceptance_from(&root, payload).map(Self::Acceptance),
            other => Err(malformed(
                "response",
                format!("unknown root <{other}>"),
                payload,
            )),
        }
    }
}

/// Parse a seed endpoint body.
pub fn parse_seed(payload: &str) -> Result<SeedResponse, AuthorityError> {
    let root = expect_root("seed", "SeedResponse", payload)?;
    seed_from(&root, payload)
}

/// Parse a token endpoint body.
pub fn parse_token(payload: &str) -> Result<TokenGrant, AuthorityError> {
    let root = expect_root("token", "TokenResponse", payload)?;
    token_from(&root, payload)
}

/// Parse an upload acknowledgement.
pub fn parse_upload(payload: &str) -> Result<UploadReceipt, AuthorityError> {
    let root = expect_root(CodeFamily::Upload.as_str(), "UploadAck", payload)?;
    upload_from(&root, payload)
}

/// Parse a batch status report.
pub fn parse_status(payload: &str) -> Result<StatusReport, AuthorityError> {
    let root = expect_root(CodeFamily::Batch.as_str(), "BatchStatus", payload)?;
    status_from(&root, payload)
}

/// Parse a counterparty acceptance notice.
pub fn parse_acceptance(payload: &str) -> Result<AcceptanceNotice, AuthorityError> {
    let root = expect_root(CodeFamily::Acceptance.as_str(), "AcceptanceNotice", payload)?;
    acceptance_from(&root, payload)
}

// ---------------------------------------------------------------------------
// Per-family readers
// ---------------------------------------------------------------------------

fn seed_from(root: &XmlElement, payload: &str) -> Result<SeedResponse, AuthorityError> {
    let status = required(root, "Status", "seed", payload)?;
    if status != HANDSHAKE_OK {
        return Err(AuthorityError::SeedUnavailable {
            detail: detail_or(root, &format!("status {status}")),
        });
    }
    let seed = required(root, "Seed", "seed", payload)?;
    Ok(SeedResponse { seed })
}

fn token_from(root: &XmlElement, payload: &str) -> Result<TokenGrant, AuthorityError> {
    let status = required(root, "Status", "token", payload)?;
    if status != HANDSHAKE_OK {
        return Err(AuthorityError::TokenRejected {
            detail: detail_or(root, &format!("status {status}")),
        });
    }
    let token = required(root, "Token", "token", payload)?;
    let lifetime_secs = match root.child_text("Lifetime") {
        Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
            malformed("token", format!("bad <Lifetime> {raw:?}"), payload)
        })?),
        None => None,
    };
    Ok(TokenGrant {
        token,
        lifetime_secs,
    })
}

fn upload_from(root: &XmlElement, payload: &str) -> Result<UploadReceipt, AuthorityError> {
    let family = CodeFamily::Upload;
    let code = required(root, "Status", family.as_str(), payload)?;
    let outcome = normalize(family, &code, root.child_text("Detail").as_deref(), payload)?;
    let tracking_id = match root.child_text("TrackId") {
        Some(raw) if !raw.trim().is_empty() => Some(
            TrackingId::new(raw)
                .map_err(|e| malformed(family.as_str(), e.to_string(), payload))?,
        ),
        _ => None,
    };
    match (outcome.state.is_terminal(), &tracking_id) {
        (false, None) => Err(malformed(
            family.as_str(),
            format!("code {code} without <TrackId>"),
            payload,
        )),
        (true, Some(_)) => Err(malformed(
            family.as_str(),
            format!("rejection code {code} with a <TrackId>"),
            payload,
        )),
        _ => Ok(UploadReceipt {
            outcome,
            tracking_id,
        }),
    }
}

fn status_from(root: &XmlElement, payload: &str) -> Result<StatusReport, AuthorityError> {
    let family = CodeFamily::Batch;
    let tracking_id = TrackingId::new(required(root, "TrackId", family.as_str(), payload)?)
        .map_err(|e| malformed(family.as_str(), e.to_string(), payload))?;
    let code = required(root, "Status", family.as_str(), payload)?;
    let batch = normalize(family, &code, root.child_text("Detail").as_deref(), payload)?;

    let mut documents = Vec::new();
    for doc in root.find_all("Document") {
        let kind = doc
            .attribute("kind")
            .and_then(|k| k.parse::<u16>().ok())
            .and_then(|k| DocumentKind::from_code(k).ok())
            .ok_or_else(|| malformed(family.as_str(), "bad <Document kind>".into(), payload))?;
        let folio = doc
            .attribute("folio")
            .and_then(|f| f.parse::<u64>().ok())
            .and_then(|f| Folio::new(f).ok())
            .ok_or_else(|| malformed(family.as_str(), "bad <Document folio>".into(), payload))?;
        let doc_code = required(doc, "Status", CodeFamily::Document.as_str(), payload)?;
        let outcome = normalize(
            CodeFamily::Document,
            &doc_code,
            doc.child_text("Detail").as_deref(),
            payload,
        )?;
        documents.push(DocumentStatus {
            kind,
            folio,
            outcome,
        });
    }

    Ok(StatusReport {
        tracking_id,
        batch,
        documents,
    })
}

fn acceptance_from(root: &XmlElement, payload: &str) -> Result<AcceptanceNotice, AuthorityError> {
    let family = CodeFamily::Acceptance.as_str();
    let issuer = TaxId::new(required(root, "Issuer", family, payload)?)
        .map_err(|e| malformed(family, e.to_string(), payload))?;
    let kind = required(root, "Kind", family, payload)?
        .parse::<u16>()
        .ok()
        .and_then(|k| DocumentKind::from_code(k).ok())
        .ok_or_else(|| malformed(family, "bad <Kind>".into(), payload))?;
    let folio = required(root, "Folio", family, payload)?
        .parse::<u64>()
        .ok()
        .and_then(|f| Folio::new(f).ok())
        .ok_or_else(|| malformed(family, "bad <Folio>".into(), payload))?;
    let code = required(root, "Code", family, payload)?;
    let Some((response, default_detail)) = codes::acceptance(&code) else {
        return Err(unknown_code(CodeFamily::Acceptance, &code, payload));
    };
    Ok(AcceptanceNotice {
        issuer,
        kind,
        folio,
        response,
        detail: detail_or(root, default_detail),
        code,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize(
    family: CodeFamily,
    code: &str,
    detail: Option<&str>,
    payload: &str,
) -> Result<Outcome, AuthorityError> {
    codes::normalize(family, code, detail).ok_or_else(|| unknown_code(family, code, payload))
}

fn parse_root(family: &'static str, payload: &str) -> Result<XmlElement, AuthorityError> {
    XmlElement::parse(payload).map_err(|e| malformed(family, e.to_string(), payload))
}

fn expect_root(family: &'static str, name: &str, payload: &str) -> Result<XmlElement, AuthorityError> {
    let root = parse_root(family, payload)?;
    if root.name() != name {
        return Err(malformed(
            family,
            format!("expected <{name}>, got <{}>", root.name()),
            payload,
        ));
    }
    Ok(root)
}

fn required(
    element: &XmlElement,
    child: &str,
    family: &'static str,
    payload: &str,
) -> Result<String, AuthorityError> {
    match element.child_text(child) {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(malformed(family, format!("missing <{child}>"), payload)),
    }
}

fn detail_or(root: &XmlElement, fallback: &str) -> String {
    match root.child_text("Detail") {
        Some(d) if !d.trim().is_empty() => d.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn unknown_code(family: CodeFamily, code: &str, payload: &str) -> AuthorityError {
    tracing::error!(
        family = family.as_str(),
        code,
        payload,
        "unrecognized authority response code"
    );
    AuthorityError::UnknownCode {
        family: family.as_str(),
        code: code.to_string(),
        payload: payload.to_string(),
    }
}

fn malformed(family: &'static str, reason: String, payload: &str) -> AuthorityError {
    tracing::error!(family, %reason, payload, "malformed authority response");
    AuthorityError::Malformed {
        family,
        reason,
        payload: payload.to_string(),
    }
}
