mod cli;

use std::{path::Path, process, sync::Arc};

use aggregations::{aggregate, filter_guests, AnalyticsSummary, DateSelection};
use chrono::{DateTime, FixedOffset, Local, Utc};
use clap::Parser;
use cli::{Cli, Command};
use core_types::{AppConfig, ConfigError, JoinedGuest};
use entry_gate::{Admission, EntryGate, GateError, Verification};
use ledger::{LedgerConfig, LedgerController, LedgerError, StorageReport};
use log::info;
use roster_ingestion_service::{IngestError, RosterIngestionService};
use serde::Serialize;
use thiserror::Error;

/// Exit status when `admit` finds the token already entered.
const EXIT_ALREADY_ENTERED: i32 = 2;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("guest-gate failed: {err}");
            process::exit(1);
        }
    }
}

fn run() -> Result<i32, AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let ledger_config = LedgerConfig::from_settings(&config.ledger);
    let (controller, report) = LedgerController::bootstrap(ledger_config)?;
    log_storage_summary(&report);
    let controller = Arc::new(controller);

    match cli.command {
        Command::Ingest { file } => ingest(controller, &file)?,
        Command::Verify { token } => {
            let gate = EntryGate::with_read_retry(controller, config.retry.policy());
            let verification = gate.verify(&token)?;
            print_json(&VerifyResponse {
                message: verification.message(),
                verification: &verification,
            })?;
        }
        Command::Admit { token } => {
            let gate = EntryGate::with_read_retry(controller, config.retry.policy());
            let admission = gate.admit(&token)?;
            print_json(&AdmitResponse::from(admission))?;
            if !admission.is_admitted() {
                return Ok(EXIT_ALREADY_ENTERED);
            }
        }
        Command::Scan { token } => {
            let gate = EntryGate::with_read_retry(controller, config.retry.policy());
            print_json(&gate.scan(&token))?;
        }
        Command::Guests { view, search } => {
            let gate = EntryGate::with_read_retry(controller, config.retry.policy());
            let guests = gate.list_guests()?;
            print_json(&filter_guests(&guests, view, &search))?;
        }
        Command::Analytics { date } => {
            let gate = EntryGate::with_read_retry(controller, config.retry.policy());
            let guests = gate.list_guests()?;
            let summary = match config.analytics.utc_offset_minutes {
                Some(minutes) => {
                    let zone = FixedOffset::east_opt(minutes * 60)
                        .ok_or(AppError::Config(ConfigError::OffsetOutOfRange { value: minutes }))?;
                    summarize(&guests, date, &zone)
                }
                None => summarize(&guests, date, &Local),
            };
            print_json(&summary)?;
        }
    }
    Ok(0)
}

fn ingest(controller: Arc<LedgerController>, file: &Path) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    let service = RosterIngestionService::new(controller);
    let report = runtime.block_on(service.ingest_file(file))?;
    info!(
        "ingested {} of {} rows from {}",
        report.records_created,
        report.rows_read,
        file.display()
    );
    print_json(&report)
}

fn summarize<Tz>(guests: &[JoinedGuest], date: Option<DateSelection>, zone: &Tz) -> AnalyticsSummary
where
    Tz: chrono::TimeZone,
{
    let selection =
        date.unwrap_or_else(|| DateSelection::Day(Utc::now().with_timezone(zone).date_naive()));
    info!("computing analytics for {selection}");
    aggregate(guests, &selection, zone)
}

#[derive(Serialize)]
struct VerifyResponse<'a> {
    #[serde(flatten)]
    verification: &'a Verification,
    message: String,
}

#[derive(Serialize)]
struct AdmitResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    entered_at: DateTime<Utc>,
}

impl From<Admission> for AdmitResponse {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Admitted { entered_at } => Self {
                success: true,
                error: None,
                entered_at,
            },
            Admission::AlreadyEntered { entered_at } => Self {
                success: false,
                error: Some("already_entered"),
                entered_at,
            },
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_storage_summary(report: &StorageReport) {
    info!(
        "ledger file: {} (created={}, schema=v{}, roster={}, entries={})",
        report.path.display(),
        report.created,
        report.schema_version,
        report.roster_rows,
        report.entry_rows
    );
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
