//! # Authority Session Lifecycle
//!
//! ```text
//! NoSession ──▶ SeedRequested ──▶ SeedSigned ──▶ TokenIssued ──▶ Expired
//!     ▲               │               │                            │
//!     └───────────────┴───── failure ─┘            re-handshake ───┘
//! ```
//!
//! `TokenIssued → Expired` happens purely by clock comparison; an expired
//! session is never reused.

use chrono::{DateTime, Utc};
use dte_core::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handshake phase for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No token and no handshake in flight.
    NoSession,
    /// A seed has been requested.
    SeedRequested,
    /// The seed has been signed.
    SeedSigned,
    /// A bearer token is active.
    TokenIssued,
    /// The token's lifetime has passed.
    Expired,
}

impl SessionState {
    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSession => "NO_SESSION",
            Self::SeedRequested => "SEED_REQUESTED",
            Self::SeedSigned => "SEED_SIGNED",
            Self::TokenIssued => "TOKEN_ISSUED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Whether `self → to` is an allowed edge. Any in-flight phase may
    /// fall back to `NoSession` on failure.
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        use SessionState::*;
        match self {
            NoSession => to == SeedRequested,
            SeedRequested => matches!(to, SeedSigned | NoSession),
            SeedSigned => matches!(to, TokenIssued | NoSession),
            TokenIssued => to == Expired,
            Expired => to == SeedRequested,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid handshake step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid session transition from {from} to {to}")]
pub struct SessionTransitionError {
    /// Current phase.
    pub from: SessionState,
    /// Attempted phase.
    pub to: SessionState,
}

/// Tracks the handshake phase of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl SessionLifecycle {
    /// Start with no session.
    pub fn new() -> Self {
        Self {
            state: SessionState::NoSession,
        }
    }

    /// Current phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `to` if the edge exists.
    pub fn advance(&mut self, to: SessionState) -> Result<(), SessionTransitionError> {
        if !self.state.can_transition_to(to) {
            return Err(SessionTransitionError { from: self.state, to });
        }
        self.state = to;
        Ok(())
    }

    /// Abandon an in-flight handshake.
    pub fn fail(&mut self) {
        if matches!(self.state, SessionState::SeedRequested | SessionState::SeedSigned) {
            self.state = SessionState::NoSession;
        }
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// A bearer token for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthoritySession {
    /// Account the token authorizes.
    pub account: AccountId,
    token: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being usable.
    pub expires_at: DateTime<Utc>,
}

impl AuthoritySession {
    /// Wrap a freshly issued token.
    pub fn new(account: AccountId, token: String, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            account,
            token,
            issued_at,
            expires_at,
        }
    }

    /// The bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the session may still be used at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// The phase a cached session is in at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.is_active_at(now) {
            SessionState::TokenIssued
        } else {
            SessionState::Expired
        }
    }
}

impl std::fmt::Debug for AuthoritySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthoritySession")
            .field("account", &self.account)
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
