use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::{
    config::LedgerConfig,
    error::{LedgerError, Result},
};

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS roster (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    responsibility TEXT,
    district TEXT,
    constituency TEXT,
    constituency_number TEXT,
    station_number TEXT,
    display_name TEXT,
    file_name TEXT,
    token TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_roster_token ON roster (token);
CREATE TABLE IF NOT EXISTS entries (
    token TEXT NOT NULL,
    entered_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_token_unique ON entries (token);
";

#[derive(Clone, Debug)]
pub struct StorageReport {
    pub path: PathBuf,
    pub created: bool,
    pub schema_version: i64,
    pub roster_rows: u64,
    pub entry_rows: u64,
}

/// Opens the database file, switches it to WAL and applies the schema once.
pub fn open(config: &LedgerConfig) -> Result<(Connection, StorageReport)> {
    config.ensure_dirs()?;
    let path = config.database_path();
    let mut conn = open_connection(&path, config)?;
    let (created, schema_version) = ensure_schema(&mut conn)?;
    let roster_rows = count_rows(&conn, "roster")?;
    let entry_rows = count_rows(&conn, "entries")?;
    Ok((
        conn,
        StorageReport {
            path,
            created,
            schema_version,
            roster_rows,
            entry_rows,
        },
    ))
}

fn open_connection(path: &Path, config: &LedgerConfig) -> Result<Connection> {
    let wrap = |source| LedgerError::Open {
        path: path.to_path_buf(),
        source,
    };
    let conn = Connection::open(path).map_err(wrap)?;
    conn.busy_timeout(config.busy_timeout).map_err(wrap)?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(wrap)?;
    if !mode.eq_ignore_ascii_case("wal") {
        log::warn!("ledger at {:?} running in {} journal mode", path, mode);
    }
    Ok(conn)
}

fn ensure_schema(conn: &mut Connection) -> Result<(bool, i64)> {
    // Immediate: concurrent bootstraps serialize on the write lock.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let found: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let created = match found {
        0 => {
            tx.execute_batch(SCHEMA)?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            true
        }
        SCHEMA_VERSION => false,
        other => {
            return Err(LedgerError::SchemaMismatch {
                found: other,
                expected: SCHEMA_VERSION,
            })
        }
    };
    tx.commit()?;
    Ok((created, SCHEMA_VERSION))
}

pub(crate) fn count_rows(conn: &Connection, table: &'static str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Storage keeps milliseconds; callers compare what they wrote against what they read.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

pub(crate) fn millis_to_utc(table: &'static str, value: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or(LedgerError::InvalidTimestamp { table, value })
}
