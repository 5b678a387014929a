//! # Verify Subcommand
//!
//! Checks a signed document's enveloped signature, its certificate chain
//! up to a trust anchor, and the signer's validity on the issue date.
//!
//! ```bash
//! dte verify signed.xml --anchor ca.xml
//! ```
//!
//! Exit code 0 when valid, 2 when the document does not verify.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dte_core::XmlElement;
use dte_crypto::Certificate;
use dte_document::{verify_document, VerifiedDocument};

use crate::read_input;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Signed document XML (`-` for standard input).
    pub document: PathBuf,

    /// Trust anchor certificate XML.
    #[arg(long)]
    pub anchor: PathBuf,
}

pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let anchor = load_anchor(&read_input(&args.anchor)?)?;
    let signed = read_input(&args.document)?;
    match verify_document(&signed, &anchor) {
        Ok(verified) => {
            println!("{}", describe(&verified));
            Ok(0)
        }
        Err(e) => {
            println!("INVALID: {e}");
            Ok(2)
        }
    }
}

/// Parse a `<Certificate>` element.
pub fn load_anchor(xml: &str) -> Result<Certificate> {
    let element = XmlElement::parse(xml).context("anchor is not well-formed XML")?;
    Certificate::from_xml(&element).context("anchor is not a certificate")
}

pub fn describe(verified: &VerifiedDocument) -> String {
    let s = &verified.summary;
    format!(
        "VALID: kind {} folio {} issued {} by {} total {}; signed by {} (serial {})",
        s.kind,
        s.folio,
        s.issue_date,
        s.issuer_tax_id,
        s.total,
        verified.signer.fields().subject_name,
        verified.signer.serial()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::signed_document;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn valid_document_exits_zero() {
        let (signed, anchor) = signed_document();
        let dir = tempfile::tempdir().unwrap();
        let args = VerifyArgs {
            document: write(&dir, "doc.xml", &signed),
            anchor: write(&dir, "ca.xml", &anchor),
        };
        assert_eq!(run_verify(&args).unwrap(), 0);

        let verified = verify_document(&signed, &load_anchor(&anchor).unwrap()).unwrap();
        let line = describe(&verified);
        assert!(line.contains("folio 100"));
        assert!(line.contains("total 11900"));
        assert!(line.contains("serial 200"));
    }

    #[test]
    fn tampered_document_exits_two() {
        let (signed, anchor) = signed_document();
        let dir = tempfile::tempdir().unwrap();
        let args = VerifyArgs {
            document: write(&dir, "doc.xml", &signed.replace("Consulting", "Consultancy")),
            anchor: write(&dir, "ca.xml", &anchor),
        };
        assert_eq!(run_verify(&args).unwrap(), 2);
    }

    #[test]
    fn anchor_must_be_a_certificate() {
        assert!(load_anchor("<Grant/>").is_err());
        assert!(load_anchor("not xml").is_err());
    }
}
