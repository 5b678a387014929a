//! # Credential Material
//!
//! [`KeyMaterial`] holds one account's private signing key and the
//! certificate chain that certifies it. It is loaded, never generated, and
//! is read-only once built.
//!
//! [`CredentialStore`] abstracts where material comes from:
//!
//! - [`MemoryCredentialStore`]: registered in process (tests, embedding).
//! - [`FileCredentialStore`]: one directory per account holding
//!   `signing.key` (64 hex chars, the Ed25519 seed) and `chain.xml`
//!   (a `<CertificateChain>` document). Loads are cached per account;
//!   concurrent first loads for the same account are single-flight.
//!
//! Building material runs a self-test: a fixed payload is signed with the
//! private key and verified with the leaf certificate's public key, so a
//! mismatched key/certificate pair is rejected at load time rather than at
//! the Authority.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use dte_core::{AccountId, CanonicalXml, XmlElement};

use crate::certificate::{Certificate, CertificateChain};
use crate::ed25519::{Signature, SigningKey};
use crate::error::CryptoError;

/// An account's signing key and certificate chain.
#[derive(Debug)]
pub struct KeyMaterial {
    account: AccountId,
    signing_key: SigningKey,
    chain: CertificateChain,
}

impl KeyMaterial {
    /// Bind a key to its chain after checking they belong together.
    pub fn new(
        account: AccountId,
        signing_key: SigningKey,
        chain: CertificateChain,
    ) -> Result<Self, CryptoError> {
        let self_test = CanonicalXml::render(
            &XmlElement::new("CredentialSelfTest").text_child("Account", account.as_str()),
        )?;
        let signature = signing_key.sign(&self_test);
        chain
            .leaf()
            .public_key()
            .verify(&self_test, &signature)
            .map_err(|_| {
                CryptoError::InvalidCertificate(format!(
                    "signing key for account {account} does not match leaf certificate {}",
                    chain.leaf().serial()
                ))
            })?;
        Ok(Self {
            account,
            signing_key,
            chain,
        })
    }

    /// Owning account.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// The certificate chain, leaf first.
    pub fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    /// The end-entity certificate.
    pub fn certificate(&self) -> &Certificate {
        self.chain.leaf()
    }

    /// Fail with `KeyMaterialExpired` unless the leaf is valid on `date`.
    pub fn ensure_valid_on(&self, date: NaiveDate) -> Result<(), CryptoError> {
        self.chain.leaf().check_valid_on(date)
    }

    /// Sign canonical XML with the account key.
    pub fn sign(&self, data: &CanonicalXml) -> Signature {
        self.signing_key.sign(data)
    }
}

/// Source of per-account credential material.
///
/// Implementations must be `Send + Sync` so one store can be shared by all
/// request workers.
pub trait CredentialStore: Send + Sync {
    /// Load (or return cached) material for `account`.
    fn load(&self, account: &AccountId) -> Result<Arc<KeyMaterial>, CryptoError>;

    /// Human-readable name for diagnostics.
    fn store_name(&self) -> &str;
}

// ─── MemoryCredentialStore ───────────────────────────────────────────────

/// In-memory credential registry.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<AccountId, Arc<KeyMaterial>>,
}

impl MemoryCredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register material, replacing any previous entry for its account.
    pub fn insert(&self, material: KeyMaterial) {
        self.entries
            .insert(material.account.clone(), Arc::new(material));
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, account: &AccountId) -> Result<Arc<KeyMaterial>, CryptoError> {
        self.entries
            .get(account)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CryptoError::KeyMaterialMissing {
                account: account.to_string(),
            })
    }

    fn store_name(&self) -> &str {
        "MemoryCredentialStore"
    }
}

// ─── FileCredentialStore ─────────────────────────────────────────────────

/// Directory-backed credential store with a per-account cache.
#[derive(Debug)]
pub struct FileCredentialStore {
    root: PathBuf,
    cache: DashMap<AccountId, Arc<KeyMaterial>>,
}

impl FileCredentialStore {
    /// Key file name inside an account directory.
    pub const KEY_FILE: &'static str = "signing.key";
    /// Chain file name inside an account directory.
    pub const CHAIN_FILE: &'static str = "chain.xml";

    /// Store rooted at `root` (one sub-directory per account).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    fn read_from_disk(&self, account: &AccountId) -> Result<KeyMaterial, CryptoError> {
        let dir = self.root.join(account.as_str());
        if !dir.is_dir() {
            return Err(CryptoError::KeyMaterialMissing {
                account: account.to_string(),
            });
        }
        let key_hex = zeroize::Zeroizing::new(std::fs::read_to_string(dir.join(Self::KEY_FILE))?);
        let signing_key = SigningKey::from_hex(&key_hex)?;
        let chain_xml = std::fs::read_to_string(dir.join(Self::CHAIN_FILE))?;
        let chain = CertificateChain::from_xml(&XmlElement::parse(&chain_xml)?)?;
        tracing::info!(
            account = %account,
            certificate = chain.leaf().serial(),
            "loaded credential material from disk"
        );
        KeyMaterial::new(account.clone(), signing_key, chain)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, account: &AccountId) -> Result<Arc<KeyMaterial>, CryptoError> {
        // The entry guard holds the shard lock for the duration of the
        // disk read, so concurrent first loads resolve to one read.
        let entry = self
            .cache
            .entry(account.clone())
            .or_try_insert_with(|| self.read_from_disk(account).map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }

    fn store_name(&self) -> &str {
        "FileCredentialStore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::CertificateFields;
    use chrono::{TimeZone, Utc};
    use dte_core::TaxId;

    fn material(account: &str) -> (KeyMaterial, [u8; 32], CertificateChain) {
        let seed = [11u8; 32];
        let key = SigningKey::from_seed(&seed);
        let fields = CertificateFields {
            serial: "7".to_string(),
            subject_name: "Acme SpA".to_string(),
            subject_tax_id: TaxId::new("76086428-5").unwrap(),
            issuer_name: "Acme SpA".to_string(),
            not_before: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).unwrap(),
            public_key: key.public_key(),
        };
        let cert = Certificate::self_signed(fields, &key).unwrap();
        let chain = CertificateChain::new(vec![cert]).unwrap();
        let m = KeyMaterial::new(AccountId::new(account).unwrap(), key, chain.clone()).unwrap();
        (m, seed, chain)
    }

    #[test]
    fn mismatched_key_rejected() {
        let (_, _, chain) = material("acme");
        let wrong = SigningKey::generate();
        let err = KeyMaterial::new(AccountId::new("acme").unwrap(), wrong, chain).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidCertificate(_)));
    }

    #[test]
    fn memory_store_missing_account() {
        let store = MemoryCredentialStore::new();
        let err = store.load(&AccountId::new("nobody").unwrap()).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMaterialMissing { .. }));
    }

    #[test]
    fn memory_store_returns_registered_material() {
        let store = MemoryCredentialStore::new();
        let (m, _, _) = material("acme");
        store.insert(m);
        let loaded = store.load(&AccountId::new("acme").unwrap()).unwrap();
        assert_eq!(loaded.certificate().serial(), "7");
    }

    #[test]
    fn ensure_valid_on_uses_leaf_window() {
        let (m, _, _) = material("acme");
        assert!(m.ensure_valid_on(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()).is_ok());
        assert!(m.ensure_valid_on(NaiveDate::from_ymd_opt(2027, 6, 1).unwrap()).is_err());
    }

    #[test]
    fn file_store_loads_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let (_, seed, chain) = material("acme");
        let account_dir = dir.path().join("acme");
        std::fs::create_dir_all(&account_dir).unwrap();
        let hex: String = seed.iter().map(|b| format!("{b:02x}")).collect();
        std::fs::write(account_dir.join(FileCredentialStore::KEY_FILE), hex).unwrap();
        let chain_xml = CanonicalXml::render(&chain.to_xml()).unwrap();
        std::fs::write(account_dir.join(FileCredentialStore::CHAIN_FILE), chain_xml.as_str()).unwrap();

        let store = FileCredentialStore::new(dir.path());
        let account = AccountId::new("acme").unwrap();
        let first = store.load(&account).unwrap();

        // Remove the files: the second load must come from the cache.
        std::fs::remove_dir_all(&account_dir).unwrap();
        let second = store.load(&account).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn file_store_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let err = store.load(&AccountId::new("ghost").unwrap()).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMaterialMissing { .. }));
    }
}
