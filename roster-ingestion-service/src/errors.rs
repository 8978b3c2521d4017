use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upload is empty")]
    EmptyUpload,
    #[error("unsupported upload format '{name}'; only .csv and .xlsx are accepted")]
    UnsupportedFormat { name: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv_async::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),
}
