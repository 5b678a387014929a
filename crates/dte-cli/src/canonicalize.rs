//! # Canonicalize Subcommand
//!
//! Validates a JSON draft, numbers it with the given folio, and prints the
//! canonical `<Document>` XML the signer would sign. Useful for diffing
//! what the business layer sends against what the Authority receives.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dte_core::{AccountId, Folio};
use dte_document::{canonicalize, DocumentDraft, DocumentEnvelope, TaxRate};

use crate::read_input;

#[derive(Args, Debug)]
pub struct CanonicalizeArgs {
    /// Draft JSON (`-` for standard input).
    pub draft: PathBuf,

    /// Folio to number the document with.
    #[arg(long)]
    pub folio: u64,

    /// Account the draft is issued under.
    #[arg(long, default_value = "local")]
    pub account: String,

    /// Tax rate in basis points.
    #[arg(long, default_value_t = 1900)]
    pub tax_rate_bp: u32,

    /// Write the XML here instead of standard output.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run_canonicalize(args: &CanonicalizeArgs) -> Result<u8> {
    let envelope = build(args, &read_input(&args.draft)?)?;
    let xml = envelope.canonical.with_declaration();
    match &args.out {
        Some(path) => {
            std::fs::write(path, &xml).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "wrote {} (kind {}, folio {}, total {})",
                path.display(),
                envelope.kind,
                envelope.folio,
                envelope.totals.total
            );
        }
        None => println!("{xml}"),
    }
    Ok(0)
}

pub fn build(args: &CanonicalizeArgs, draft_json: &str) -> Result<DocumentEnvelope> {
    let draft: DocumentDraft = serde_json::from_str(draft_json).context("draft is not valid JSON")?;
    let account = AccountId::new(args.account.as_str())?;
    let folio = Folio::new(args.folio)?;
    let rate = TaxRate::from_basis_points(args.tax_rate_bp)?;
    Ok(canonicalize(&account, &draft, folio, rate)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::draft;

    fn args(folio: u64) -> CanonicalizeArgs {
        CanonicalizeArgs {
            draft: PathBuf::from("-"),
            folio,
            account: "acme".to_string(),
            tax_rate_bp: 1900,
            out: None,
        }
    }

    #[test]
    fn renders_numbered_document() {
        let json = serde_json::to_string(&draft()).unwrap();
        let envelope = build(&args(100), &json).unwrap();
        assert_eq!(envelope.folio.value(), 100);
        assert_eq!(envelope.totals.total, 11_900);
        assert!(envelope.canonical.as_str().starts_with("<Document"));
    }

    #[test]
    fn same_draft_renders_identically() {
        let json = serde_json::to_string(&draft()).unwrap();
        let a = build(&args(7), &json).unwrap();
        let b = build(&args(7), &json).unwrap();
        assert_eq!(a.canonical, b.canonical);
    }

    #[test]
    fn invalid_inputs_fail() {
        let json = serde_json::to_string(&draft()).unwrap();
        assert!(build(&args(0), &json).is_err());
        assert!(build(&args(1), "{").is_err());
        let mut empty = draft();
        empty.lines.clear();
        assert!(build(&args(1), &serde_json::to_string(&empty).unwrap()).is_err());
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("draft.json");
        std::fs::write(&input, serde_json::to_string(&draft()).unwrap()).unwrap();
        let out = dir.path().join("doc.xml");
        let mut a = args(100);
        a.draft = input;
        a.out = Some(out.clone());
        assert_eq!(run_canonicalize(&a).unwrap(), 0);
        assert!(std::fs::read_to_string(out).unwrap().contains("<Document"));
    }
}
