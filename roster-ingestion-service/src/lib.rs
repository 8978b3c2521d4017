// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use core_types::{GuestDetails, ROSTER_COLUMNS};
use ledger::LedgerController;
use log::{info, warn};
use serde::Serialize;

mod errors;
pub mod upload;

pub use errors::IngestError;
pub use upload::{UploadFormat, UploadRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub format: UploadFormat,
    pub rows_read: usize,
    pub records_created: usize,
}

/// Maps upload rows onto roster records.
///
/// Row 0 is always a header and is dropped. Rows with no cells are skipped.
/// Fails with `EmptyUpload` when nothing remains after the header.
pub fn roster_records(rows: &[UploadRow]) -> Result<Vec<GuestDetails>, IngestError> {
    let body = rows.get(1..).unwrap_or_default();
    let records: Vec<GuestDetails> = body
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            if row.len() > ROSTER_COLUMNS {
                log::debug!("ignoring {} extra cells in upload row", row.len() - ROSTER_COLUMNS);
            }
            GuestDetails::from_cells(row)
        })
        .collect();
    if records.is_empty() {
        return Err(IngestError::EmptyUpload);
    }
    Ok(records)
}

/// Roster ingestion: the only writer of roster rows.
pub struct RosterIngestionService {
    ledger: Arc<LedgerController>,
}

impl RosterIngestionService {
    pub fn new(ledger: Arc<LedgerController>) -> Self {
        Self { ledger }
    }

    /// Parses and ingests an upload. Format and emptiness are checked before any write.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport, IngestError> {
        let name = path.to_string_lossy();
        let format = UploadFormat::from_file_name(&name)?;
        let rows = upload::read_rows(path, format).await?;
        info!("read {} {} rows from {}", rows.len(), format.label(), name);
        let records_created = self.ingest(&rows)?;
        Ok(IngestReport {
            format,
            rows_read: rows.len(),
            records_created,
        })
    }

    /// Creates one roster entry per data row. Never deduplicates; no rollback on failure.
    pub fn ingest(&self, rows: &[UploadRow]) -> Result<usize, IngestError> {
        let records = roster_records(rows)?;
        let tokenless = records.iter().filter(|r| r.token.is_none()).count();
        if tokenless > 0 {
            warn!("{tokenless} roster rows have no scan token and can never be matched");
        }
        let created = self.ledger.append_roster(&records, Utc::now())?;
        info!("ingested {created} roster entries");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ScanToken;
    use ledger::LedgerConfig;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const HEADER: &str = "Responsibility,District,Constituency,No,Station,Name,File,QR\n";

    fn service() -> (TempDir, RosterIngestionService) {
        let dir = tempdir().unwrap();
        let (controller, _) =
            LedgerController::bootstrap(LedgerConfig::new(dir.path().join("state"))).unwrap();
        (dir, RosterIngestionService::new(Arc::new(controller)))
    }

    fn row(cells: &[&str]) -> UploadRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn header_is_always_discarded() {
        // Row 0 looks like data but is still dropped.
        let rows = vec![
            row(&["Lead", "", "", "", "", "Asha", "", "A"]),
            row(&["Lead", "", "", "", "", "Bo", "", "B"]),
        ];
        let records = roster_records(&rows).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token.as_deref(), Some("B"));
    }

    #[test]
    fn empty_and_header_only_uploads_fail() {
        assert!(matches!(roster_records(&[]), Err(IngestError::EmptyUpload)));
        assert!(matches!(
            roster_records(&[row(&["h1", "h2"])]),
            Err(IngestError::EmptyUpload)
        ));
        assert!(matches!(
            roster_records(&[row(&["h1"]), Vec::new()]),
            Err(IngestError::EmptyUpload)
        ));
    }

    #[test]
    fn zero_cell_rows_are_skipped() {
        let rows = vec![
            row(&["header"]),
            Vec::new(),
            row(&["", "", "", "", "", "", "", "T"]),
            Vec::new(),
        ];
        let records = roster_records(&rows).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn ingest_twice_doubles_roster() {
        let (_dir, service) = service();
        let rows = vec![
            row(&["h"]),
            row(&["Lead", "North", "Central", "7", "12", "Asha", "list.csv", "A"]),
            row(&["Member", "South", "", "", "", "Bo", "list.csv", "B"]),
        ];
        assert_eq!(service.ingest(&rows).unwrap(), 2);
        assert_eq!(service.ingest(&rows).unwrap(), 2);
        assert_eq!(service.ledger.roster_len().unwrap(), 4);
    }

    #[tokio::test]
    async fn ingest_file_reads_csv_uploads() {
        let (dir, service) = service();
        let path = dir.path().join("Roster.CSV");
        fs::write(
            &path,
            format!("{HEADER}Lead, North ,Central,7,12,Asha,list.csv,QR-1\n\n,,,,,Bo,,\n"),
        )
        .unwrap();

        let report = service.ingest_file(&path).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                format: UploadFormat::Csv,
                rows_read: 3,
                records_created: 2,
            }
        );

        let token = ScanToken::parse("QR-1").unwrap();
        let guest = service.ledger.find_guest(&token).unwrap().unwrap();
        assert_eq!(guest.details.district.as_deref(), Some("North"));
        assert_eq!(guest.display_name(), Some("Asha"));
    }

    #[tokio::test]
    async fn ingest_file_reads_xlsx_uploads() {
        let (_dir, service) = service();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/roster.xlsx");

        let report = service.ingest_file(&path).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                format: UploadFormat::Xlsx,
                rows_read: 4,
                records_created: 2,
            }
        );

        let lead = service
            .ledger
            .find_guest(&ScanToken::parse("QR-1").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(lead.details.constituency_number.as_deref(), Some("7"));
        assert_eq!(lead.details.station_number.as_deref(), Some("12"));

        let member = service
            .ledger
            .find_guest(&ScanToken::parse("QR-2").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(member.display_name(), Some("Bo"));
        assert_eq!(member.details.district, None);
        assert!(service
            .ledger
            .find_guest(&ScanToken::parse("QR-9").unwrap())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unsupported_format_writes_nothing() {
        let (dir, service) = service();
        let path = dir.path().join("roster.txt");
        fs::write(&path, format!("{HEADER}a,b,c,d,e,f,g,h\n")).unwrap();

        let err = service.ingest_file(&path).await.unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
        assert_eq!(service.ledger.roster_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn header_only_csv_is_empty_upload() {
        let (dir, service) = service();
        let path = dir.path().join("roster.csv");
        fs::write(&path, HEADER).unwrap();

        let err = service.ingest_file(&path).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyUpload));
        assert_eq!(service.ledger.roster_len().unwrap(), 0);
    }
}
