//! # dte-cli — DTE Operator Command-Line Interface
//!
//! Offline tooling around the issuance stack. Nothing here talks to the
//! Authority or to the database; every subcommand works on files.
//!
//! ## Subcommands
//!
//! - `verify` — check a signed document against a trust anchor
//! - `canonicalize` — render a JSON draft as canonical document XML
//! - `gaps` — report unissued folios in a list of issued ones
//! - `grant` — summarize (and optionally cross-check) a range grant
//!
//! Handlers return the process exit code; argument parsing lives in
//! `main.rs`.

pub mod canonicalize;
pub mod gaps;
pub mod grant;
pub mod verify;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Read a file, or standard input when `path` is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read standard input")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
pub(crate) mod fixtures;
