// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncRead;

use crate::errors::IngestError;

/// One upload row as raw cells, in column order.
pub type UploadRow = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Csv,
    Xlsx,
}

impl UploadFormat {
    /// Detects the format from the file extension, ignoring case.
    pub fn from_file_name(name: &str) -> Result<Self, IngestError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(UploadFormat::Csv),
            Some("xlsx") => Ok(UploadFormat::Xlsx),
            _ => Err(IngestError::UnsupportedFormat {
                name: name.to_string(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UploadFormat::Csv => "csv",
            UploadFormat::Xlsx => "xlsx",
        }
    }
}

pub async fn read_rows(path: &Path, format: UploadFormat) -> Result<Vec<UploadRow>, IngestError> {
    match format {
        UploadFormat::Csv => {
            let file = File::open(path).await?;
            read_csv(file).await
        }
        UploadFormat::Xlsx => {
            let bytes = tokio::fs::read(path).await?;
            read_xlsx(bytes)
        }
    }
}

/// Header handling is left to the caller; blank lines never produce a row.
pub async fn read_csv<R>(reader: R) -> Result<Vec<UploadRow>, IngestError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut csv_reader = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .create_reader(reader);
    let mut records = csv_reader.records();
    let mut rows = Vec::new();
    while let Some(record) = records.next().await {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Reads the first worksheet. Trailing empty cells are dropped, so blank rows come back empty.
pub fn read_xlsx(bytes: Vec<u8>) -> Result<Vec<UploadRow>, IngestError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Err(IngestError::EmptyUpload);
    };
    let range = range?;
    let rows = range
        .rows()
        .map(|cells| {
            let width = cells
                .iter()
                .rposition(|cell| !matches!(cell, Data::Empty))
                .map_or(0, |idx| idx + 1);
            cells[..width].iter().map(|cell| cell.to_string()).collect()
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_is_extension_based() {
        assert_eq!(UploadFormat::from_file_name("guests.csv").unwrap(), UploadFormat::Csv);
        assert_eq!(UploadFormat::from_file_name("GUESTS.XLSX").unwrap(), UploadFormat::Xlsx);
        for name in ["guests.xls", "guests.txt", "guests", "csv"] {
            assert!(matches!(
                UploadFormat::from_file_name(name),
                Err(IngestError::UnsupportedFormat { .. })
            ));
        }
    }

    #[tokio::test]
    async fn csv_keeps_ragged_rows_and_skips_blank_lines() {
        let data = "a,b,c\n\n\"x, y\",2\n,,,\n";
        let rows = read_csv(data.as_bytes()).await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".into(), "c".into()],
                vec!["x, y".to_string(), "2".into()],
                vec![String::new(), String::new(), String::new(), String::new()],
            ]
        );
    }

    #[test]
    fn xlsx_reads_first_sheet_as_display_text() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/roster.xlsx");
        let rows = read_xlsx(std::fs::read(path).unwrap()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], "Responsibility");
        assert_eq!(
            rows[1],
            vec!["Lead", "North", "Central", "7", "12", "Asha", "roster.xlsx", "QR-1"]
        );
        assert!(rows[2].is_empty());
        assert_eq!(rows[3][5], "Bo");
        assert!(rows.iter().flatten().all(|cell| cell != "QR-9"));
    }

    #[test]
    fn xlsx_rejects_non_workbook_bytes() {
        let err = read_xlsx(b"not a workbook".to_vec()).unwrap_err();
        assert!(matches!(err, IngestError::Spreadsheet(_)));
    }
}
