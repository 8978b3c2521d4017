use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Every variant means the store could not be consulted; callers must fail closed.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("state directory unavailable: {path}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger storage unavailable at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("ledger storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),
    #[error("ledger schema mismatch (file={found}, expected={expected})")]
    SchemaMismatch { found: i64, expected: i64 },
    #[error("invalid timestamp {value} in {table}")]
    InvalidTimestamp { table: &'static str, value: i64 },
}

impl LedgerError {
    /// Busy or locked database; the same read may succeed on retry.
    pub fn is_transient(&self) -> bool {
        let source = match self {
            LedgerError::Open { source, .. } => source,
            LedgerError::StorageUnavailable(source) => source,
            _ => return false,
        };
        matches!(
            source.sqlite_error_code(),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}
