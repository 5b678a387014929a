//! # SHA-256 Digests over Canonical XML
//!
//! `sha256()` accepts only `&CanonicalXml`, so every digest in the stack
//! was computed over canonically rendered bytes.

use sha2::{Digest, Sha256};

use crate::canonical::CanonicalXml;

/// A 32-byte SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Digest canonical XML bytes.
pub fn sha256(xml: &CanonicalXml) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(xml.as_bytes());
    Sha256Digest(hasher.finalize().into())
}
