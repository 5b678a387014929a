//! # Enveloped XML Signatures
//!
//! Signs a content element and places the signature inside the same root,
//! after the content:
//!
//! ```text
//! <Root ...>
//!   <Content ID="X">...</Content>
//!   <Signature>
//!     <SignedInfo>
//!       <CanonicalizationMethod Algorithm="urn:dte:c14n:v1"/>
//!       <SignatureMethod Algorithm="urn:dte:ed25519"/>
//!       <Reference URI="#X">
//!         <DigestMethod Algorithm="urn:dte:sha256"/>
//!         <DigestValue>base64</DigestValue>
//!       </Reference>
//!     </SignedInfo>
//!     <SignatureValue>base64</SignatureValue>
//!     <KeyInfo><CertificateChain>...</CertificateChain></KeyInfo>
//!   </Signature>
//! </Root>
//! ```
//!
//! The digest covers the canonical rendering of the content element; the
//! signature covers the canonical rendering of `SignedInfo`.
//!
//! ## Verification
//!
//! [`verify_enveloped`] accepts a document only if all of the following
//! hold; together they make any single-byte mutation of the signed output
//! fail verification:
//!
//! 1. The whole input is canonical ([`CanonicalXml::parse_strict`]).
//! 2. The root element's name and attributes equal the expected root.
//! 3. The root has exactly two children: content, then `Signature`.
//! 4. `Signature` is structurally identical to the one the signer would
//!    have produced for the parsed digest, signature, and chain.
//! 5. The content digest matches, the signature verifies with the leaf
//!    certificate key, and the chain is anchored at the trusted
//!    certificate.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dte_core::{sha256, CanonicalXml, XmlElement};

use crate::certificate::{Certificate, CertificateChain};
use crate::ed25519::Signature;
use crate::error::CryptoError;
use crate::material::KeyMaterial;

/// Canonicalization algorithm identifier.
pub const C14N_ALGORITHM: &str = "urn:dte:c14n:v1";
/// Signature algorithm identifier.
pub const SIGNATURE_ALGORITHM: &str = "urn:dte:ed25519";
/// Digest algorithm identifier.
pub const DIGEST_ALGORITHM: &str = "urn:dte:sha256";

/// A successfully verified envelope.
#[derive(Debug, Clone)]
pub struct VerifiedEnvelope {
    /// The signed content element.
    pub content: XmlElement,
    /// The certificate chain embedded in the signature.
    pub chain: CertificateChain,
}

/// Sign `content` and wrap it with the signature inside `root`.
///
/// `content` must carry an `ID` attribute; it becomes the reference URI.
/// `root` supplies the wrapper's name and attributes; any children it
/// already has are rejected.
pub fn sign_enveloped(
    root: XmlElement,
    content: XmlElement,
    material: &KeyMaterial,
) -> Result<CanonicalXml, CryptoError> {
    if root.nodes().iter().next().is_some() {
        return Err(CryptoError::SignatureFailure(
            "envelope root must be empty before signing".to_string(),
        ));
    }
    let reference_id = content
        .attribute("ID")
        .ok_or_else(|| CryptoError::SignatureFailure("content element has no ID".to_string()))?
        .to_string();

    let digest = sha256(&CanonicalXml::render(&content)?);
    let signed_info = signed_info_element(&reference_id, &STANDARD.encode(digest.as_bytes()));
    let signature = material.sign(&CanonicalXml::render(&signed_info)?);
    let signature_element = signature_element(signed_info, &signature, material.chain());

    let signed = CanonicalXml::render(&root.child(content).child(signature_element))?;
    tracing::debug!(
        reference = %reference_id,
        certificate = material.certificate().serial(),
        bytes = signed.len(),
        "signed enveloped XML"
    );
    Ok(signed)
}

/// Verify an enveloped signature produced by [`sign_enveloped`].
///
/// `expected_root` is the empty root element the signer was given; its
/// name and attributes must match exactly. `anchor` is the trusted
/// certificate the embedded chain must lead to.
pub fn verify_enveloped(
    signed: &str,
    expected_root: &XmlElement,
    anchor: &Certificate,
) -> Result<VerifiedEnvelope, CryptoError> {
    let (_, tree) = CanonicalXml::parse_strict(signed)?;

    if tree.name() != expected_root.name() || tree.attributes() != expected_root.attributes() {
        return Err(fail("envelope root does not match"));
    }
    let children: Vec<&XmlElement> = tree.elements().collect();
    if children.len() != tree.nodes().len() || children.len() != 2 {
        return Err(fail("envelope must contain exactly content and Signature"));
    }
    let (content, signature_el) = (children[0], children[1]);
    if signature_el.name() != "Signature" {
        return Err(fail("second child must be <Signature>"));
    }
    let reference_id = content
        .attribute("ID")
        .ok_or_else(|| fail("content element has no ID"))?;

    let signed_info = signature_el
        .find("SignedInfo")
        .ok_or_else(|| fail("missing <SignedInfo>"))?;
    let digest_b64 = signed_info
        .descendant("DigestValue")
        .map(|d| d.text_content())
        .ok_or_else(|| fail("missing <DigestValue>"))?;
    let signature = Signature::from_base64(
        &signature_el
            .find("SignatureValue")
            .map(|s| s.text_content())
            .ok_or_else(|| fail("missing <SignatureValue>"))?,
    )?;
    let chain_el = signature_el
        .find("KeyInfo")
        .and_then(|k| k.find("CertificateChain"))
        .ok_or_else(|| fail("missing <KeyInfo><CertificateChain>"))?;
    let chain = CertificateChain::from_xml(chain_el)?;

    let expected_signed_info = signed_info_element(reference_id, &digest_b64);
    let expected_signature = signature_element(expected_signed_info.clone(), &signature, &chain);
    if &expected_signature != signature_el {
        return Err(fail("signature element is not in the expected form"));
    }

    let actual_digest = sha256(&CanonicalXml::render(content)?);
    if STANDARD.encode(actual_digest.as_bytes()) != digest_b64 {
        return Err(fail("content digest mismatch"));
    }

    chain
        .leaf()
        .public_key()
        .verify(&CanonicalXml::render(&expected_signed_info)?, &signature)?;
    chain.verify_anchored(anchor)?;

    Ok(VerifiedEnvelope {
        content: content.clone(),
        chain,
    })
}

fn signed_info_element(reference_id: &str, digest_b64: &str) -> XmlElement {
    XmlElement::new("SignedInfo")
        .child(XmlElement::new("CanonicalizationMethod").attr("Algorithm", C14N_ALGORITHM))
        .child(XmlElement::new("SignatureMethod").attr("Algorithm", SIGNATURE_ALGORITHM))
        .child(
            XmlElement::new("Reference")
                .attr("URI", format!("#{reference_id}"))
                .child(XmlElement::new("DigestMethod").attr("Algorithm", DIGEST_ALGORITHM))
                .text_child("DigestValue", digest_b64),
        )
}

fn signature_element(
    signed_info: XmlElement,
    signature: &Signature,
    chain: &CertificateChain,
) -> XmlElement {
    XmlElement::new("Signature")
        .child(signed_info)
        .text_child("SignatureValue", signature.to_base64())
        .child(XmlElement::new("KeyInfo").child(chain.to_xml()))
}

fn fail(reason: &str) -> CryptoError {
    CryptoError::VerificationFailed(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::CertificateFields;
    use crate::ed25519::SigningKey;
    use chrono::{TimeZone, Utc};
    use dte_core::{AccountId, TaxId};

    fn setup() -> (KeyMaterial, Certificate) {
        let root_key = SigningKey::generate();
        let root = Certificate::self_signed(
            CertificateFields {
                serial: "1".to_string(),
                subject_name: "Test CA".to_string(),
                subject_tax_id: TaxId::new("60803000-K").unwrap(),
                issuer_name: "Test CA".to_string(),
                not_before: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                not_after: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
                public_key: root_key.public_key(),
            },
            &root_key,
        )
        .unwrap();
        let key = SigningKey::generate();
        let leaf = Certificate::issue(
            CertificateFields {
                serial: "200".to_string(),
                subject_name: "Acme SpA".to_string(),
                subject_tax_id: TaxId::new("76086428-5").unwrap(),
                issuer_name: "Test CA".to_string(),
                not_before: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                not_after: Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap(),
                public_key: key.public_key(),
            },
            &root_key,
        )
        .unwrap();
        let chain = CertificateChain::new(vec![leaf, root.clone()]).unwrap();
        let material = KeyMaterial::new(AccountId::new("acme").unwrap(), key, chain).unwrap();
        (material, root)
    }

    fn root() -> XmlElement {
        XmlElement::new("Envelope").attr("version", "1.0")
    }

    fn content() -> XmlElement {
        XmlElement::new("Payload")
            .attr("ID", "P1")
            .text_child("Amount", "16900")
    }

    #[test]
    fn sign_then_verify() {
        let (material, anchor) = setup();
        let signed = sign_enveloped(root(), content(), &material).unwrap();
        let verified = verify_enveloped(signed.as_str(), &root(), &anchor).unwrap();
        assert_eq!(verified.content, content());
        assert_eq!(verified.chain.leaf().serial(), "200");
    }

    #[test]
    fn signing_is_deterministic() {
        let (material, _) = setup();
        let a = sign_enveloped(root(), content(), &material).unwrap();
        let b = sign_enveloped(root(), content(), &material).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn content_without_id_rejected() {
        let (material, _) = setup();
        let err = sign_enveloped(root(), XmlElement::new("Payload"), &material).unwrap_err();
        assert!(matches!(err, CryptoError::SignatureFailure(_)));
    }

    #[test]
    fn every_single_byte_mutation_fails() {
        let (material, anchor) = setup();
        let signed = sign_enveloped(root(), content(), &material).unwrap();
        let bytes = signed.as_bytes();
        for i in 0..bytes.len() {
            let mut mutated = bytes.to_vec();
            mutated[i] = if mutated[i] == b'A' { b'B' } else { b'A' };
            let Ok(text) = String::from_utf8(mutated) else {
                continue;
            };
            assert!(
                verify_enveloped(&text, &root(), &anchor).is_err(),
                "mutation at byte {i} verified"
            );
        }
    }

    #[test]
    fn wrong_root_rejected() {
        let (material, anchor) = setup();
        let signed = sign_enveloped(root(), content(), &material).unwrap();
        let other_root = XmlElement::new("Envelope").attr("version", "2.0");
        assert!(verify_enveloped(signed.as_str(), &other_root, &anchor).is_err());
    }

    #[test]
    fn untrusted_anchor_rejected() {
        let (material, _) = setup();
        let (_, other_anchor) = setup();
        let signed = sign_enveloped(root(), content(), &material).unwrap();
        assert!(verify_enveloped(signed.as_str(), &root(), &other_anchor).is_err());
    }
}
