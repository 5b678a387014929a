//! # Certificates and Certificate Chains
//!
//! A [`Certificate`] binds a taxpayer identity and validity window to an
//! Ed25519 public key, signed by its issuer. The to-be-signed part is the
//! canonical XML rendering of the certificate without its
//! `IssuerSignature` element.
//!
//! ```text
//! <Certificate serial="..">
//!   <Subject><Name/><TaxId/></Subject>
//!   <Issuer/>
//!   <Validity><NotBefore/><NotAfter/></Validity>
//!   <PublicKey algorithm="ed25519">hex</PublicKey>
//!   <IssuerSignature>base64</IssuerSignature>
//! </Certificate>
//! ```
//!
//! A [`CertificateChain`] is ordered leaf first; every certificate is
//! signed by the next one, and the last is signed by (or is) a trust
//! anchor supplied at verification time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use dte_core::{CanonicalXml, TaxId, XmlElement};

use crate::ed25519::{PublicKey, Signature, SigningKey};
use crate::error::CryptoError;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const KEY_ALGORITHM: &str = "ed25519";

/// The signed content of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFields {
    /// Issuer-assigned serial number.
    pub serial: String,
    /// Legal name of the key holder.
    pub subject_name: String,
    /// Tax identifier of the key holder.
    pub subject_tax_id: TaxId,
    /// Name of the issuing authority (the next certificate's subject).
    pub issuer_name: String,
    /// Start of validity (second precision).
    pub not_before: DateTime<Utc>,
    /// End of validity (second precision).
    pub not_after: DateTime<Utc>,
    /// The certified public key.
    pub public_key: PublicKey,
}

/// A certificate: fields plus the issuer's signature over them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    fields: CertificateFields,
    issuer_signature: Signature,
}

impl Certificate {
    /// Issue a certificate by signing `fields` with `issuer_key`.
    ///
    /// Validity instants are truncated to whole seconds.
    pub fn issue(mut fields: CertificateFields, issuer_key: &SigningKey) -> Result<Self, CryptoError> {
        if fields.not_after < fields.not_before {
            return Err(CryptoError::InvalidCertificate(
                "not_after precedes not_before".to_string(),
            ));
        }
        fields.not_before = truncate_seconds(fields.not_before);
        fields.not_after = truncate_seconds(fields.not_after);
        let tbs = CanonicalXml::render(&tbs_element(&fields))?;
        let issuer_signature = issuer_key.sign(&tbs);
        Ok(Self {
            fields,
            issuer_signature,
        })
    }

    /// Issue a self-signed (root) certificate. `fields.public_key` must be
    /// the public half of `key`.
    pub fn self_signed(fields: CertificateFields, key: &SigningKey) -> Result<Self, CryptoError> {
        if fields.public_key != key.public_key() {
            return Err(CryptoError::InvalidCertificate(
                "self-signed certificate key does not match signing key".to_string(),
            ));
        }
        Self::issue(fields, key)
    }

    /// The signed fields.
    pub fn fields(&self) -> &CertificateFields {
        &self.fields
    }

    /// Serial number.
    pub fn serial(&self) -> &str {
        &self.fields.serial
    }

    /// Certified public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.fields.public_key
    }

    /// Subject tax identifier.
    pub fn subject_tax_id(&self) -> &TaxId {
        &self.fields.subject_tax_id
    }

    /// Whether `date` falls inside the validity window (inclusive, UTC days).
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.fields.not_before.date_naive() <= date && date <= self.fields.not_after.date_naive()
    }

    /// Fail with `KeyMaterialExpired` unless valid on `date`.
    pub fn check_valid_on(&self, date: NaiveDate) -> Result<(), CryptoError> {
        if self.is_valid_on(date) {
            Ok(())
        } else {
            Err(CryptoError::KeyMaterialExpired {
                serial: self.fields.serial.clone(),
                date,
                not_before: self.fields.not_before.date_naive(),
                not_after: self.fields.not_after.date_naive(),
            })
        }
    }

    /// Verify this certificate was signed by `issuer_key`.
    pub fn verify_issued_by(&self, issuer_key: &PublicKey) -> Result<(), CryptoError> {
        let tbs = CanonicalXml::render(&tbs_element(&self.fields))?;
        issuer_key
            .verify(&tbs, &self.issuer_signature)
            .map_err(|e| {
                CryptoError::VerificationFailed(format!(
                    "certificate {} issuer signature: {e}",
                    self.fields.serial
                ))
            })
    }

    /// Full XML form, including the issuer signature.
    pub fn to_xml(&self) -> XmlElement {
        tbs_element(&self.fields).text_child("IssuerSignature", self.issuer_signature.to_base64())
    }

    /// Parse the XML form. The element must match the rendering of the
    /// parsed certificate exactly.
    pub fn from_xml(element: &XmlElement) -> Result<Self, CryptoError> {
        if element.name() != "Certificate" {
            return Err(CryptoError::InvalidCertificate(format!(
                "expected <Certificate>, found <{}>",
                element.name()
            )));
        }
        let serial = element
            .attribute("serial")
            .ok_or_else(|| invalid("missing serial attribute"))?
            .to_string();
        let subject = element.find("Subject").ok_or_else(|| invalid("missing <Subject>"))?;
        let subject_name = subject.child_text("Name").ok_or_else(|| invalid("missing subject <Name>"))?;
        let subject_tax_id = subject
            .child_text("TaxId")
            .ok_or_else(|| invalid("missing subject <TaxId>"))
            .and_then(|t| TaxId::new(t).map_err(|e| invalid(&e.to_string())))?;
        let issuer_name = element.child_text("Issuer").ok_or_else(|| invalid("missing <Issuer>"))?;
        let validity = element.find("Validity").ok_or_else(|| invalid("missing <Validity>"))?;
        let not_before = parse_time(validity.child_text("NotBefore"))?;
        let not_after = parse_time(validity.child_text("NotAfter"))?;
        let key_element = element.find("PublicKey").ok_or_else(|| invalid("missing <PublicKey>"))?;
        if key_element.attribute("algorithm") != Some(KEY_ALGORITHM) {
            return Err(invalid("unsupported public key algorithm"));
        }
        let public_key = PublicKey::from_hex(&key_element.text_content())
            .map_err(|e| invalid(&e.to_string()))?;
        let issuer_signature = Signature::from_base64(
            &element
                .child_text("IssuerSignature")
                .ok_or_else(|| invalid("missing <IssuerSignature>"))?,
        )
        .map_err(|e| invalid(&e.to_string()))?;

        let cert = Self {
            fields: CertificateFields {
                serial,
                subject_name,
                subject_tax_id,
                issuer_name,
                not_before,
                not_after,
                public_key,
            },
            issuer_signature,
        };
        if &cert.to_xml() != element {
            return Err(invalid("certificate XML is not in canonical form"));
        }
        Ok(cert)
    }
}

/// An ordered, non-empty certificate chain (leaf first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain(Vec<Certificate>);

impl CertificateChain {
    /// Build a chain, checking that each certificate is issued by the next.
    pub fn new(certificates: Vec<Certificate>) -> Result<Self, CryptoError> {
        if certificates.is_empty() {
            return Err(invalid("certificate chain is empty"));
        }
        for pair in certificates.windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            if child.fields.issuer_name != parent.fields.subject_name {
                return Err(invalid(&format!(
                    "certificate {} names issuer {:?} but is followed by {:?}",
                    child.fields.serial, child.fields.issuer_name, parent.fields.subject_name
                )));
            }
            child.verify_issued_by(&parent.fields.public_key)?;
        }
        Ok(Self(certificates))
    }

    /// The end-entity certificate.
    pub fn leaf(&self) -> &Certificate {
        // Non-empty by construction.
        &self.0[0]
    }

    /// All certificates, leaf first.
    pub fn certificates(&self) -> &[Certificate] {
        &self.0
    }

    /// Verify the chain terminates at `anchor`.
    ///
    /// Walking from the leaf, the chain is anchored as soon as a
    /// certificate carries the anchor's public key; otherwise the last
    /// certificate must be signed by the anchor.
    pub fn verify_anchored(&self, anchor: &Certificate) -> Result<(), CryptoError> {
        for (i, cert) in self.0.iter().enumerate() {
            if cert.public_key() == anchor.public_key() {
                return Ok(());
            }
            match self.0.get(i + 1) {
                Some(next) => cert.verify_issued_by(next.public_key())?,
                None => cert.verify_issued_by(anchor.public_key())?,
            }
        }
        Ok(())
    }

    /// XML form: `<CertificateChain>` wrapping each certificate.
    pub fn to_xml(&self) -> XmlElement {
        self.0
            .iter()
            .fold(XmlElement::new("CertificateChain"), |acc, c| acc.child(c.to_xml()))
    }

    /// Parse the XML form and re-validate the chain links.
    pub fn from_xml(element: &XmlElement) -> Result<Self, CryptoError> {
        if element.name() != "CertificateChain" {
            return Err(invalid("expected <CertificateChain>"));
        }
        let certs = element
            .elements()
            .map(Certificate::from_xml)
            .collect::<Result<Vec<_>, _>>()?;
        let chain = Self::new(certs)?;
        if &chain.to_xml() != element {
            return Err(invalid("certificate chain XML is not in canonical form"));
        }
        Ok(chain)
    }
}

fn tbs_element(fields: &CertificateFields) -> XmlElement {
    XmlElement::new("Certificate")
        .attr("serial", fields.serial.clone())
        .child(
            XmlElement::new("Subject")
                .text_child("Name", fields.subject_name.clone())
                .text_child("TaxId", fields.subject_tax_id.as_str()),
        )
        .text_child("Issuer", fields.issuer_name.clone())
        .child(
            XmlElement::new("Validity")
                .text_child("NotBefore", fields.not_before.format(TIME_FORMAT).to_string())
                .text_child("NotAfter", fields.not_after.format(TIME_FORMAT).to_string()),
        )
        .child(
            XmlElement::new("PublicKey")
                .attr("algorithm", KEY_ALGORITHM)
                .text(fields.public_key.to_hex()),
        )
}

fn truncate_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

fn parse_time(value: Option<String>) -> Result<DateTime<Utc>, CryptoError> {
    let value = value.ok_or_else(|| invalid("missing validity instant"))?;
    NaiveDateTime::parse_from_str(&value, TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| invalid(&format!("bad validity instant {value:?}: {e}")))
}

fn invalid(reason: &str) -> CryptoError {
    CryptoError::InvalidCertificate(reason.to_string())
}
