use chrono::{DateTime, Utc};
use core_types::{EntryRecord, GuestDetails, JoinedGuest, RosterEntry, ScanToken};
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::{
    config::LedgerConfig,
    entries::{self, EntryWrite},
    error::Result,
    roster,
    storage::{self, count_rows, truncate_to_millis, StorageReport},
};

/// Owns one connection to the shared ledger database.
///
/// Each process (or each scanner in tests) bootstraps its own controller; the
/// database file, not this struct, is the single point of truth.
pub struct LedgerController {
    conn: Mutex<Connection>,
}

impl LedgerController {
    pub fn bootstrap(config: LedgerConfig) -> Result<(Self, StorageReport)> {
        let (conn, report) = storage::open(&config)?;
        log::debug!(
            "ledger opened at {:?} (created={}, roster={}, entries={})",
            report.path,
            report.created,
            report.roster_rows,
            report.entry_rows
        );
        Ok((
            Self {
                conn: Mutex::new(conn),
            },
            report,
        ))
    }

    pub fn find_guest(&self, token: &ScanToken) -> Result<Option<RosterEntry>> {
        let conn = self.conn.lock();
        roster::find_by_token(&conn, token)
    }

    pub fn find_entry(&self, token: &ScanToken) -> Result<Option<EntryRecord>> {
        let conn = self.conn.lock();
        entries::find(&conn, token)
    }

    /// Appends an admission unless one exists. `entered_at` is stored at millisecond precision.
    pub fn record_entry(&self, token: &ScanToken, entered_at: DateTime<Utc>) -> Result<EntryWrite> {
        let conn = self.conn.lock();
        entries::insert_if_absent(&conn, token, truncate_to_millis(entered_at))
    }

    /// Inserts rows one at a time; rows written before a failure stay written.
    pub fn append_roster(&self, rows: &[GuestDetails], created_at: DateTime<Utc>) -> Result<usize> {
        let created_at = truncate_to_millis(created_at);
        let conn = self.conn.lock();
        let mut written = 0;
        for details in rows {
            roster::insert(&conn, details, created_at)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn list_guests(&self) -> Result<Vec<JoinedGuest>> {
        let conn = self.conn.lock();
        roster::list_joined(&conn)
    }

    pub fn roster_len(&self) -> Result<u64> {
        let conn = self.conn.lock();
        count_rows(&conn, "roster")
    }

    pub fn entry_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        count_rows(&conn, "entries")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn guest(name: &str, token: &str) -> GuestDetails {
        GuestDetails {
            display_name: Some(name.to_string()),
            token: Some(token.to_string()),
            ..GuestDetails::default()
        }
    }

    #[test]
    fn controller_records_and_joins_entries() {
        let dir = tempdir().unwrap();
        let (controller, report) =
            LedgerController::bootstrap(LedgerConfig::new(dir.path().to_path_buf())).unwrap();
        assert!(report.created);

        let created = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let written = controller
            .append_roster(&[guest("Ana", "A"), guest("Bo", "B"), guest("Cy", "C")], created)
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(controller.roster_len().unwrap(), 3);

        let token = ScanToken::parse("B").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap();
        let write = controller.record_entry(&token, at).unwrap();
        assert!(matches!(write, EntryWrite::Recorded(_)));
        assert_eq!(controller.find_entry(&token).unwrap().unwrap().entered_at, at);

        let guests = controller.list_guests().unwrap();
        let entered: Vec<_> = guests.iter().filter(|g| g.has_entered()).collect();
        assert_eq!(entered.len(), 1);
        assert_eq!(entered[0].entry.display_name(), Some("Bo"));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().to_path_buf());
        let token = ScanToken::parse("Z").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 18, 47, 12).unwrap();
        {
            let (controller, _) = LedgerController::bootstrap(config.clone()).unwrap();
            controller.record_entry(&token, at).unwrap();
        }
        let (controller, report) = LedgerController::bootstrap(config).unwrap();
        assert!(!report.created);
        assert_eq!(report.entry_rows, 1);
        let write = controller.record_entry(&token, Utc::now()).unwrap();
        assert_eq!(write, EntryWrite::AlreadyRecorded(EntryRecord { token, entered_at: at }));
    }

    #[test]
    fn failed_append_keeps_earlier_rows() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig::new(dir.path().to_path_buf());
        let (controller, _) = LedgerController::bootstrap(config.clone()).unwrap();
        Connection::open(config.database_path())
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_bad_token BEFORE INSERT ON roster \
                 WHEN NEW.token = 'BAD' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let rows = [guest("Ana", "A"), guest("Bo", "B"), guest("X", "BAD"), guest("Cy", "C")];
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert!(controller.append_roster(&rows, created).is_err());
        assert_eq!(controller.roster_len().unwrap(), 2);
        let token = ScanToken::parse("C").unwrap();
        assert!(controller.find_guest(&token).unwrap().is_none());
    }

    #[test]
    fn record_entry_truncates_to_millis() {
        let dir = tempdir().unwrap();
        let (controller, _) =
            LedgerController::bootstrap(LedgerConfig::new(dir.path().to_path_buf())).unwrap();
        let token = ScanToken::parse("N").unwrap();
        let at = Utc.timestamp_opt(1_704_104_100, 987_654_321).unwrap();
        let write = controller.record_entry(&token, at).unwrap();
        let stored = controller.find_entry(&token).unwrap().unwrap();
        assert_eq!(write.record().entered_at, stored.entered_at);
        assert_eq!(stored.entered_at.timestamp_subsec_millis(), 987);
    }
}
