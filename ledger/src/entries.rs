use chrono::{DateTime, Utc};
use core_types::{EntryRecord, ScanToken};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{error::Result, storage::millis_to_utc};

/// Outcome of inserting into the ledger's unique token index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryWrite {
    Recorded(EntryRecord),
    /// The token already had a row; carries the original admission.
    AlreadyRecorded(EntryRecord),
}

impl EntryWrite {
    pub fn record(&self) -> &EntryRecord {
        match self {
            EntryWrite::Recorded(record) | EntryWrite::AlreadyRecorded(record) => record,
        }
    }
}

pub(crate) fn find(conn: &Connection, token: &ScanToken) -> Result<Option<EntryRecord>> {
    let entered_at_ms: Option<i64> = conn
        .query_row(
            "SELECT entered_at FROM entries WHERE token = ?1",
            params![token.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    entered_at_ms
        .map(|ms| {
            Ok(EntryRecord {
                token: token.clone(),
                entered_at: millis_to_utc("entries", ms)?,
            })
        })
        .transpose()
}

/// Insert-if-absent as one statement; the unique index arbitrates racing writers,
/// including writers in other processes.
pub(crate) fn insert_if_absent(
    conn: &Connection,
    token: &ScanToken,
    entered_at: DateTime<Utc>,
) -> Result<EntryWrite> {
    let inserted = conn.execute(
        "INSERT INTO entries (token, entered_at) VALUES (?1, ?2) \
         ON CONFLICT (token) DO NOTHING",
        params![token.as_str(), entered_at.timestamp_millis()],
    )?;
    if inserted == 1 {
        return Ok(EntryWrite::Recorded(EntryRecord {
            token: token.clone(),
            entered_at,
        }));
    }
    match find(conn, token)? {
        Some(existing) => Ok(EntryWrite::AlreadyRecorded(existing)),
        None => Err(rusqlite::Error::QueryReturnedNoRows.into()),
    }
}
