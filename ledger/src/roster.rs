use chrono::{DateTime, Utc};
use core_types::{GuestDetails, JoinedGuest, RosterEntry, RosterId, ScanToken};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{error::Result, storage::millis_to_utc};

const ROSTER_COLUMNS_SQL: &str = "r.id, r.responsibility, r.district, r.constituency, \
     r.constituency_number, r.station_number, r.display_name, r.file_name, r.token, r.created_at";

struct RawRosterRow {
    id: i64,
    details: GuestDetails,
    created_at_ms: i64,
}

impl RawRosterRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            details: GuestDetails {
                responsibility: row.get(1)?,
                district: row.get(2)?,
                constituency: row.get(3)?,
                constituency_number: row.get(4)?,
                station_number: row.get(5)?,
                display_name: row.get(6)?,
                file_name: row.get(7)?,
                token: row.get(8)?,
            },
            created_at_ms: row.get(9)?,
        })
    }

    fn into_entry(self) -> Result<RosterEntry> {
        Ok(RosterEntry {
            id: RosterId(self.id),
            details: self.details,
            created_at: millis_to_utc("roster", self.created_at_ms)?,
        })
    }
}

pub(crate) fn insert(
    conn: &Connection,
    details: &GuestDetails,
    created_at: DateTime<Utc>,
) -> Result<RosterId> {
    conn.execute(
        "INSERT INTO roster (responsibility, district, constituency, constituency_number, \
         station_number, display_name, file_name, token, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            details.responsibility,
            details.district,
            details.constituency,
            details.constituency_number,
            details.station_number,
            details.display_name,
            details.file_name,
            details.token,
            created_at.timestamp_millis(),
        ],
    )?;
    Ok(RosterId(conn.last_insert_rowid()))
}

/// Earliest-ingested row wins when a token appears more than once.
pub(crate) fn find_by_token(conn: &Connection, token: &ScanToken) -> Result<Option<RosterEntry>> {
    let sql = format!(
        "SELECT {ROSTER_COLUMNS_SQL} FROM roster r WHERE r.token = ?1 ORDER BY r.id ASC LIMIT 1"
    );
    let raw = conn
        .query_row(&sql, params![token.as_str()], RawRosterRow::read)
        .optional()?;
    raw.map(RawRosterRow::into_entry).transpose()
}

/// Roster left-joined with the ledger, newest roster rows first.
pub(crate) fn list_joined(conn: &Connection) -> Result<Vec<JoinedGuest>> {
    let sql = format!(
        "SELECT {ROSTER_COLUMNS_SQL}, e.entered_at FROM roster r \
         LEFT JOIN entries e ON e.token = r.token ORDER BY r.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let raw = RawRosterRow::read(row)?;
        let entered_at_ms: Option<i64> = row.get(10)?;
        Ok((raw, entered_at_ms))
    })?;
    let mut guests = Vec::new();
    for row in rows {
        let (raw, entered_at_ms) = row?;
        let entered_at = entered_at_ms
            .map(|ms| millis_to_utc("entries", ms))
            .transpose()?;
        guests.push(JoinedGuest {
            entry: raw.into_entry()?,
            entered_at,
        });
    }
    Ok(guests)
}
