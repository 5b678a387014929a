//! # dte CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dte_cli::canonicalize::{run_canonicalize, CanonicalizeArgs};
use dte_cli::gaps::{run_gaps, GapsArgs};
use dte_cli::grant::{run_grant, GrantArgs};
use dte_cli::verify::{run_verify, VerifyArgs};

/// DTE operator tooling.
///
/// Verifies signed tax documents, renders drafts in canonical form, and
/// audits folio numbering, all offline.
#[derive(Parser, Debug)]
#[command(name = "dte", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a signed document against a trust anchor certificate.
    Verify(VerifyArgs),

    /// Render a JSON draft as canonical document XML.
    Canonicalize(CanonicalizeArgs),

    /// Report unissued folios in a list of issued ones.
    Gaps(GapsArgs),

    /// Summarize a range grant and optionally cross-check it.
    Grant(GrantArgs),
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if std::env::var("DTE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Verify(args) => run_verify(args),
        Commands::Canonicalize(args) => run_canonicalize(args),
        Commands::Gaps(args) => run_gaps(args),
        Commands::Grant(args) => run_grant(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parse_verify() {
        let cli = Cli::try_parse_from(["dte", "verify", "doc.xml", "--anchor", "ca.xml"]).unwrap();
        let Commands::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(args.document, PathBuf::from("doc.xml"));
        assert_eq!(args.anchor, PathBuf::from("ca.xml"));
    }

    #[test]
    fn verify_requires_anchor() {
        assert!(Cli::try_parse_from(["dte", "verify", "doc.xml"]).is_err());
    }

    #[test]
    fn parse_canonicalize_defaults() {
        let cli = Cli::try_parse_from(["dte", "canonicalize", "-", "--folio", "42"]).unwrap();
        let Commands::Canonicalize(args) = cli.command else {
            panic!("expected canonicalize");
        };
        assert_eq!(args.folio, 42);
        assert_eq!(args.tax_rate_bp, 1900);
        assert_eq!(args.account, "local");
        assert!(args.out.is_none());
    }

    #[test]
    fn grant_cross_check_needs_all_three() {
        assert!(Cli::try_parse_from(["dte", "grant", "g.xml", "--kind", "33"]).is_err());
        assert!(Cli::try_parse_from(["dte", "grant", "g.xml", "--kind", "33", "--from", "1"]).is_err());
        let cli =
            Cli::try_parse_from(["dte", "grant", "g.xml", "--kind", "33", "--from", "1", "--to", "9"]).unwrap();
        assert!(matches!(cli.command, Commands::Grant(_)));
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["dte", "-vv", "gaps", "-"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
