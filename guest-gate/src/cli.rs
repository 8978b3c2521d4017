use std::path::PathBuf;

use aggregations::{DateSelection, GuestView};
use clap::{Parser, Subcommand};

/// Operator tool for the entry gate: roster uploads, scans and arrival stats.
#[derive(Debug, Parser)]
#[command(name = "guest-gate", version)]
pub struct Cli {
    /// Configuration file; defaults to ./guest-gate.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Append every data row of a .csv or .xlsx upload to the roster.
    Ingest { file: PathBuf },
    /// Report whether a token may enter, without recording anything.
    Verify { token: String },
    /// Record an admission for a token.
    Admit { token: String },
    /// Verify and, when allowed, admit in one step.
    Scan { token: String },
    /// List guests joined with their admission times.
    Guests {
        #[arg(long, default_value = "all", value_parser = parse_view)]
        view: GuestView,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Summary counts and half-hour arrival series.
    Analytics {
        /// `all` or YYYY-MM-DD; today in the configured zone when omitted.
        #[arg(long, value_parser = parse_date)]
        date: Option<DateSelection>,
    },
}

fn parse_view(value: &str) -> Result<GuestView, String> {
    value.parse().map_err(|err: aggregations::SelectionError| err.to_string())
}

fn parse_date(value: &str) -> Result<DateSelection, String> {
    value.parse().map_err(|err: aggregations::SelectionError| err.to_string())
}
