//! # dte-crypto — Credential Material and Enveloped Signatures
//!
//! - **Ed25519** key and signature newtypes ([`ed25519`]).
//! - **Certificates** binding a taxpayer identity to a public key, issued
//!   and chained by a certification authority ([`certificate`]).
//! - **Credential material** per account: the private signing key plus its
//!   certificate chain, loaded from a [`CredentialStore`] and never
//!   generated at issuance time ([`material`]).
//! - **Enveloped signatures** over canonical XML: the signature element is
//!   placed inside the signed root, after the referenced content, and
//!   embeds the certificate chain so verifiers need no out-of-band lookup
//!   ([`signer`]).
//!
//! All signed input is [`CanonicalXml`](dte_core::CanonicalXml); raw bytes
//! cannot be signed.

pub mod certificate;
pub mod ed25519;
pub mod error;
pub mod material;
pub mod signer;

pub use certificate::{Certificate, CertificateChain, CertificateFields};
pub use ed25519::{PublicKey, Signature, SigningKey};
pub use error::CryptoError;
pub use material::{CredentialStore, FileCredentialStore, KeyMaterial, MemoryCredentialStore};
pub use signer::{sign_enveloped, verify_enveloped, VerifiedEnvelope};
