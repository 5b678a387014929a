//! # Gaps Subcommand
//!
//! Reads issued folio numbers (whitespace, comma, or newline separated)
//! and reports every unissued interval between the lowest and highest.
//!
//! ```bash
//! psql -Atc "select folio from issued_folios where account='acme' and kind=33" | dte gaps -
//! ```

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use dte_folio::{find_gaps, FolioGap};

use crate::read_input;

#[derive(Args, Debug)]
pub struct GapsArgs {
    /// File of folio numbers (`-` for standard input).
    pub input: PathBuf,

    /// Print the gaps as a JSON array.
    #[arg(long)]
    pub json: bool,

    /// Exit with code 3 when any gap is found.
    #[arg(long)]
    pub fail_on_gaps: bool,
}

pub fn run_gaps(args: &GapsArgs) -> Result<u8> {
    let folios = parse_folios(&read_input(&args.input)?)?;
    let gaps = find_gaps(folios);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&gaps)?);
    } else {
        print!("{}", render(&gaps));
    }
    Ok(if args.fail_on_gaps && !gaps.is_empty() { 3 } else { 0 })
}

pub fn parse_folios(text: &str) -> Result<Vec<u64>> {
    let mut folios = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
        match token.parse::<u64>() {
            Ok(0) | Err(_) => bail!("not a folio number: {token:?}"),
            Ok(n) => folios.push(n),
        }
    }
    tracing::debug!(count = folios.len(), "read folios");
    Ok(folios)
}

pub fn render(gaps: &[FolioGap]) -> String {
    if gaps.is_empty() {
        return "no gaps\n".to_string();
    }
    let mut out = String::new();
    for gap in gaps {
        if gap.first == gap.last {
            out.push_str(&format!("  {}\n", gap.first));
        } else {
            out.push_str(&format!("  {}-{} ({} folios)\n", gap.first, gap.last, gap.len()));
        }
    }
    let missing: u64 = gaps.iter().map(FolioGap::len).sum();
    out.push_str(&format!("missing: {missing}\n"));
    out
}
