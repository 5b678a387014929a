//! # Authority HTTP Client
//!
//! [`AuthorityApi`] is the seam between the issuance pipeline and the wire.
//! [`HttpAuthorityClient`] implements it over HTTPS with `reqwest`:
//!
//! | Operation        | Request                                               |
//! |------------------|-------------------------------------------------------|
//! | `fetch_seed`     | `GET {seed_path}`                                     |
//! | `exchange_token` | `POST {token_path}`, body = signed seed               |
//! | `upload`         | `POST {upload_path}`, body = signed batch             |
//! | `query_status`   | `GET {status_path}?trackid=..`                        |
//!
//! Authenticated calls carry the token as a `TOKEN=` cookie. Uploads also
//! carry `X-Submission-Fingerprint`, the SHA-256 of the body, which the
//! Authority uses to make retried uploads idempotent.
//!
//! Each method makes exactly one attempt. Retry policy lives in the
//! [`Transmitter`](crate::Transmitter) and
//! [`SessionNegotiator`](crate::SessionNegotiator).

use async_trait::async_trait;
use dte_core::{sha256, CanonicalXml, TrackingId};

use crate::config::AuthorityConfig;
use crate::error::AuthorityError;
use crate::response::{self, SeedResponse, StatusReport, TokenGrant, UploadReceipt};

/// Header carrying the SHA-256 of an upload body.
pub const FINGERPRINT_HEADER: &str = "X-Submission-Fingerprint";

const XML_CONTENT_TYPE: &str = "application/xml";

/// The Authority's four wire operations.
#[async_trait]
pub trait AuthorityApi: Send + Sync {
    /// Request a one-time challenge.
    async fn fetch_seed(&self) -> Result<SeedResponse, AuthorityError>;

    /// Exchange a signed seed for a bearer token.
    async fn exchange_token(&self, signed_seed: &CanonicalXml) -> Result<TokenGrant, AuthorityError>;

    /// Upload a signed batch.
    async fn upload(&self, token: &str, batch: &CanonicalXml) -> Result<UploadReceipt, AuthorityError>;

    /// Query the status of a previously uploaded batch.
    async fn query_status(&self, token: &str, tracking_id: &TrackingId) -> Result<StatusReport, AuthorityError>;
}

/// `reqwest`-backed [`AuthorityApi`].
#[derive(Debug, Clone)]
pub struct HttpAuthorityClient {
    client: reqwest::Client,
    config: AuthorityConfig,
}

impl HttpAuthorityClient {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: AuthorityConfig) -> Result<Self, AuthorityError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AuthorityError::Transport {
                endpoint: "client_init".to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, request: reqwest::RequestBuilder, endpoint: &str) -> Result<String, AuthorityError> {
        let started = std::time::Instant::now();
        let resp = request
            .send()
            .await
            .map_err(|e| AuthorityError::from_reqwest(endpoint, e))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthorityError::from_reqwest(endpoint, e))?;
        tracing::debug!(
            endpoint,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "authority call completed"
        );

        if status.is_server_error() {
            return Err(AuthorityError::Transport {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthorityError::Unauthorized {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(AuthorityError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl AuthorityApi for HttpAuthorityClient {
    async fn fetch_seed(&self) -> Result<SeedResponse, AuthorityError> {
        let url = self.config.url(&self.config.seed_path);
        let body = self.send(self.client.get(url), "seed").await?;
        response::parse_seed(&body)
    }

    async fn exchange_token(&self, signed_seed: &CanonicalXml) -> Result<TokenGrant, AuthorityError> {
        let url = self.config.url(&self.config.token_path);
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(signed_seed.with_declaration());
        let body = self.send(request, "token").await?;
        response::parse_token(&body)
    }

    async fn upload(&self, token: &str, batch: &CanonicalXml) -> Result<UploadReceipt, AuthorityError> {
        let url = self.config.url(&self.config.upload_path);
        let fingerprint = sha256(batch).to_hex();
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(reqwest::header::COOKIE, format!("TOKEN={token}"))
            .header(FINGERPRINT_HEADER, fingerprint)
            .body(batch.with_declaration());
        let body = self.send(request, "upload").await?;
        response::parse_upload(&body)
    }

    async fn query_status(&self, token: &str, tracking_id: &TrackingId) -> Result<StatusReport, AuthorityError> {
        let url = self.config.url(&self.config.status_path);
        let request = self
            .client
            .get(url)
            .query(&[("trackid", tracking_id.as_str())])
            .header(reqwest::header::COOKIE, format!("TOKEN={token}"));
        let body = self.send(request, "status").await?;
        let report = response::parse_status(&body)?;
        if &report.tracking_id != tracking_id {
            return Err(AuthorityError::Malformed {
                family: "batch",
                reason: format!(
                    "asked for tracking id {tracking_id}, got {}",
                    report.tracking_id
                ),
                payload: body,
            });
        }
        Ok(report)
    }
}
