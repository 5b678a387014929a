//! # Grant Subcommand
//!
//! Prints what a range grant document covers. With `--kind`, `--from`,
//! and `--to` it also checks the grant against the range an operator is
//! about to register, exactly as the issuance service will.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dte_core::DocumentKind;
use dte_folio::GrantProof;

use crate::read_input;

#[derive(Args, Debug)]
pub struct GrantArgs {
    /// Grant document XML (`-` for standard input).
    pub grant: PathBuf,

    /// Expected document kind code.
    #[arg(long, requires = "from")]
    pub kind: Option<u16>,

    /// Expected first folio.
    #[arg(long, requires = "to")]
    pub from: Option<u64>,

    /// Expected last folio.
    #[arg(long, requires = "kind")]
    pub to: Option<u64>,
}

pub fn run_grant(args: &GrantArgs) -> Result<u8> {
    let proof = GrantProof::parse(&read_input(&args.grant)?).context("unreadable grant")?;
    println!("{}", summarize(&proof));
    if let (Some(code), Some(from), Some(to)) = (args.kind, args.from, args.to) {
        let kind = DocumentKind::from_code(code)?;
        if let Err(e) = proof.check_matches(kind, from, to) {
            println!("MISMATCH: {e}");
            return Ok(2);
        }
        println!("matches kind {kind} [{from}, {to}]");
    }
    Ok(0)
}

pub fn summarize(proof: &GrantProof) -> String {
    let issuer = proof
        .issuer
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "(not stated)".to_string());
    format!(
        "kind {} folios {}-{} ({} folios), issuer {issuer}",
        proof.kind,
        proof.from,
        proof.to,
        proof.to - proof.from + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRANT: &str = "<Grant><Issuer>76086428-5</Issuer><Kind>33</Kind><From>100</From><To>199</To></Grant>";

    fn args(dir: &tempfile::TempDir, kind: Option<u16>, from: Option<u64>, to: Option<u64>) -> GrantArgs {
        let path = dir.path().join("grant.xml");
        std::fs::write(&path, GRANT).unwrap();
        GrantArgs {
            grant: path,
            kind,
            from,
            to,
        }
    }

    #[test]
    fn summary_names_kind_range_and_issuer() {
        let proof = GrantProof::parse(GRANT).unwrap();
        assert_eq!(summarize(&proof), "kind 33 folios 100-199 (100 folios), issuer 76086428-5");
    }

    #[test]
    fn cross_check_reports_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run_grant(&args(&dir, None, None, None)).unwrap(), 0);
        assert_eq!(run_grant(&args(&dir, Some(33), Some(100), Some(199))).unwrap(), 0);
        assert_eq!(run_grant(&args(&dir, Some(33), Some(100), Some(150))).unwrap(), 2);
        assert_eq!(run_grant(&args(&dir, Some(39), Some(100), Some(199))).unwrap(), 2);
    }

    #[test]
    fn unknown_kind_code_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_grant(&args(&dir, Some(99), Some(100), Some(199))).is_err());
    }
}
