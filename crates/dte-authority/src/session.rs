//! # Session Negotiator
//!
//! Produces a bearer token per account:
//!
//! 1. fetch a seed from the Authority,
//! 2. wrap it in `<SeedRequest><Item ID="SEED"><Seed>..</Seed></Item></SeedRequest>`
//!    and sign it with the account's key (the same enveloped-signature
//!    primitive documents use),
//! 3. exchange the signed seed for a token.
//!
//! Tokens are cached per account until the [`Clock`] passes their expiry.
//! Each account has its own async mutex: concurrent callers needing a
//! session while a handshake is in flight wait for it and reuse its token.
//! A failed handshake is retried once immediately, then surfaced.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use dte_core::{AccountId, CanonicalXml, Clock, XmlElement};
use dte_crypto::{sign_enveloped, CredentialStore};
use dte_state::{AuthoritySession, SessionLifecycle, SessionState};
use tokio::sync::Mutex;

use crate::client::AuthorityApi;
use crate::error::AuthorityError;

/// Root element of a signed seed.
pub const SEED_ROOT: &str = "SeedRequest";

type SessionSlot = Arc<Mutex<Option<AuthoritySession>>>;

/// Single-flight, clock-driven token cache.
pub struct SessionNegotiator {
    api: Arc<dyn AuthorityApi>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    default_lifetime: Duration,
    slots: DashMap<AccountId, SessionSlot>,
}

impl std::fmt::Debug for SessionNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionNegotiator")
            .field("credentials", &self.credentials.store_name())
            .field("default_lifetime", &self.default_lifetime)
            .field("accounts", &self.slots.len())
            .finish()
    }
}

impl SessionNegotiator {
    pub fn new(
        api: Arc<dyn AuthorityApi>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        default_lifetime_secs: u64,
    ) -> Self {
        Self {
            api,
            credentials,
            clock,
            default_lifetime: Duration::seconds(default_lifetime_secs.min(i64::MAX as u64) as i64),
            slots: DashMap::new(),
        }
    }

    fn slot(&self, account: &AccountId) -> SessionSlot {
        self.slots
            .entry(account.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// An active session for `account`, running the handshake if needed.
    pub async fn get_session(&self, account: &AccountId) -> Result<AuthoritySession, AuthorityError> {
        let slot = self.slot(account);
        let mut cached = slot.lock().await;
        let now = self.clock.now();
        if let Some(session) = cached.as_ref() {
            match session.state_at(now) {
                SessionState::TokenIssued => return Ok(session.clone()),
                state => tracing::info!(account = %account, %state, "session expired, renegotiating"),
            }
        }
        *cached = None;

        let session = match self.handshake(account).await {
            Ok(session) => session,
            Err(first) => {
                tracing::warn!(account = %account, error = %first, "handshake failed, retrying once");
                self.handshake(account).await?
            }
        };
        *cached = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached session so the next call renegotiates.
    pub async fn invalidate(&self, account: &AccountId) {
        if let Some(slot) = self.slots.get(account).map(|s| s.clone()) {
            *slot.lock().await = None;
            tracing::info!(account = %account, "session invalidated");
        }
    }

    async fn handshake(&self, account: &AccountId) -> Result<AuthoritySession, AuthorityError> {
        let mut lifecycle = SessionLifecycle::new();
        let result = self.run_handshake(account, &mut lifecycle).await;
        if result.is_err() {
            lifecycle.fail();
        }
        result
    }

    async fn run_handshake(
        &self,
        account: &AccountId,
        lifecycle: &mut SessionLifecycle,
    ) -> Result<AuthoritySession, AuthorityError> {
        advance(lifecycle, SessionState::SeedRequested, account);
        let seed = self.api.fetch_seed().await?;

        let material = self.credentials.load(account)?;
        let signed = sign_seed(&seed.seed, &material)?;
        advance(lifecycle, SessionState::SeedSigned, account);

        let grant = self.api.exchange_token(&signed).await?;
        let issued_at = self.clock.now();
        let lifetime = grant
            .lifetime_secs
            .map(|s| Duration::seconds(s.min(i64::MAX as u64) as i64))
            .unwrap_or(self.default_lifetime);
        advance(lifecycle, SessionState::TokenIssued, account);
        tracing::info!(
            account = %account,
            lifetime_secs = lifetime.num_seconds(),
            "authority session established"
        );
        Ok(AuthoritySession::new(
            account.clone(),
            grant.token,
            issued_at,
            issued_at + lifetime,
        ))
    }
}

fn advance(lifecycle: &mut SessionLifecycle, to: SessionState, account: &AccountId) {
    let from = lifecycle.state();
    if let Err(e) = lifecycle.advance(to) {
        tracing::warn!(account = %account, error = %e, "unexpected session transition");
    } else {
        tracing::debug!(account = %account, %from, %to, "session transition");
    }
}

/// Sign a seed with the account key.
pub fn sign_seed(
    seed: &str,
    material: &dte_crypto::KeyMaterial,
) -> Result<CanonicalXml, AuthorityError> {
    let content = XmlElement::new("Item")
        .attr("ID", "SEED")
        .text_child("Seed", seed);
    sign_enveloped(XmlElement::new(SEED_ROOT), content, material).map_err(AuthorityError::SigningFailed)
}
