//! # dte-authority — Authority Wire Client
//!
//! Everything that talks to the tax Authority lives here. Higher layers
//! treat the [`SessionNegotiator`] and [`Transmitter`] as already-resilient:
//! retry and backoff policy is applied inside them and nowhere else.
//!
//! ## Modules
//!
//! - [`client`]: [`AuthorityApi`] and its `reqwest` implementation.
//! - [`codes`]: one code table per response family.
//! - [`response`]: one parser per response shape, all normalizing into
//!   [`Outcome`](dte_state::Outcome).
//! - [`session`]: seed → signed seed → token handshake, cached per account.
//! - [`batch`]: cover sheet and batch signature.
//! - [`transmitter`]: upload with bounded retry, status queries.
//! - [`retry`]: exponential backoff for transport failures.
//! - [`config`]: [`AuthorityConfig`].

pub mod batch;
pub mod client;
pub mod codes;
pub mod config;
pub mod error;
pub mod response;
pub mod retry;
pub mod session;
pub mod transmitter;

pub use batch::SubmissionBatch;
pub use client::{AuthorityApi, HttpAuthorityClient, FINGERPRINT_HEADER};
pub use codes::CodeFamily;
pub use config::{env_parse, AuthorityConfig, ConfigError};
pub use error::AuthorityError;
pub use response::{
    parse_acceptance, AcceptanceNotice, AuthorityResponse, DocumentStatus, SeedResponse, StatusReport, TokenGrant,
    UploadReceipt,
};
pub use retry::RetryPolicy;
pub use session::{sign_seed, SessionNegotiator};
pub use transmitter::{TransmitFailure, Transmission, Transmitter};
