// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Scan-time decisions: verification, admission, and the combined scanner workflow.
//!
//! [`EntryGate::verify`] is advisory and read-only. [`EntryGate::admit`] is the only
//! writer of ledger rows and relies on the ledger's unique token index, so exactly one
//! of any number of racing admissions for a token succeeds.

mod error;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_types::{JoinedGuest, RetryPolicy, RosterEntry, ScanToken};
use ledger::{EntryWrite, LedgerController, LedgerError};
use log::{error, info, warn};
use serde::Serialize;

pub use error::{GateError, GateResult};

/// Advisory answer for a scanned token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    NotFound,
    /// `person` is `None` when the ledger holds a token the roster does not know.
    AlreadyEntered {
        #[serde(skip_serializing_if = "Option::is_none")]
        person: Option<RosterEntry>,
        entered_at: DateTime<Utc>,
    },
    Allowed {
        person: RosterEntry,
    },
}

impl Verification {
    pub fn message(&self) -> String {
        match self {
            Verification::NotFound => "Guest not found in database.".to_string(),
            Verification::AlreadyEntered { entered_at, .. } => {
                format!("Already entered at {}", entered_at.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            Verification::Allowed { .. } => "Access Granted".to_string(),
        }
    }

    pub fn person(&self) -> Option<&RosterEntry> {
        match self {
            Verification::NotFound => None,
            Verification::AlreadyEntered { person, .. } => person.as_ref(),
            Verification::Allowed { person } => Some(person),
        }
    }
}

/// Result of attempting to append a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Admission {
    Admitted { entered_at: DateTime<Utc> },
    /// Someone else (or an earlier retry) already holds the row; `entered_at` is theirs.
    AlreadyEntered { entered_at: DateTime<Utc> },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }

    pub fn entered_at(&self) -> DateTime<Utc> {
        match self {
            Admission::Admitted { entered_at } | Admission::AlreadyEntered { entered_at } => {
                *entered_at
            }
        }
    }
}

/// What a scanner shows after one scan. Faults collapse into `Denied`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ScanDecision {
    Admitted {
        person: RosterEntry,
        entered_at: DateTime<Utc>,
    },
    AlreadyEntered {
        person: Option<RosterEntry>,
        entered_at: DateTime<Utc>,
    },
    NotFound,
    Denied {
        reason: String,
    },
}

impl ScanDecision {
    pub fn opens_gate(&self) -> bool {
        matches!(self, ScanDecision::Admitted { .. })
    }
}

pub struct EntryGate {
    ledger: Arc<LedgerController>,
    read_retry: RetryPolicy,
}

impl EntryGate {
    pub fn new(ledger: Arc<LedgerController>) -> Self {
        Self::with_read_retry(ledger, RetryPolicy::default())
    }

    /// `read_retry` applies to `verify` and `list_guests`; `admit` never retries.
    pub fn with_read_retry(ledger: Arc<LedgerController>, read_retry: RetryPolicy) -> Self {
        Self { ledger, read_retry }
    }

    pub fn ledger(&self) -> &Arc<LedgerController> {
        &self.ledger
    }

    pub fn verify(&self, raw: &str) -> GateResult<Verification> {
        let token = ScanToken::parse(raw)?;
        let verification = self
            .read_retry
            .retry_blocking(|_| self.verify_once(&token), LedgerError::is_transient)?;
        if matches!(verification, Verification::NotFound) {
            warn!("verify: token {} not on roster", token);
        }
        Ok(verification)
    }

    fn verify_once(&self, token: &ScanToken) -> ledger::Result<Verification> {
        let person = self.ledger.find_guest(token)?;
        let entry = self.ledger.find_entry(token)?;
        Ok(match (person, entry) {
            (person, Some(entry)) => Verification::AlreadyEntered {
                person,
                entered_at: entry.entered_at,
            },
            (Some(person), None) => Verification::Allowed { person },
            (None, None) => Verification::NotFound,
        })
    }

    /// Records the admission unless the token already has one. Does not consult the roster.
    pub fn admit(&self, raw: &str) -> GateResult<Admission> {
        let token = ScanToken::parse(raw)?;
        let admission = match self.ledger.record_entry(&token, Utc::now())? {
            EntryWrite::Recorded(record) => {
                info!("admitted {} at {}", token, record.entered_at);
                Admission::Admitted {
                    entered_at: record.entered_at,
                }
            }
            EntryWrite::AlreadyRecorded(record) => {
                warn!(
                    "admission refused for {}: already entered at {}",
                    token, record.entered_at
                );
                Admission::AlreadyEntered {
                    entered_at: record.entered_at,
                }
            }
        };
        Ok(admission)
    }

    /// Trim, verify, and admit on `allowed`. Never fails open.
    pub fn scan(&self, raw: &str) -> ScanDecision {
        match self.try_scan(raw.trim()) {
            Ok(decision) => decision,
            Err(err) => {
                if err.is_invalid_request() {
                    warn!("scan rejected: {err}");
                } else {
                    error!("scan denied, ledger unavailable: {err}");
                }
                ScanDecision::Denied {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn try_scan(&self, code: &str) -> GateResult<ScanDecision> {
        let decision = match self.verify(code)? {
            Verification::NotFound => ScanDecision::NotFound,
            Verification::AlreadyEntered { person, entered_at } => {
                ScanDecision::AlreadyEntered { person, entered_at }
            }
            Verification::Allowed { person } => match self.admit(code)? {
                Admission::Admitted { entered_at } => ScanDecision::Admitted { person, entered_at },
                // Lost the race to another scanner between verify and admit.
                Admission::AlreadyEntered { entered_at } => ScanDecision::AlreadyEntered {
                    person: Some(person),
                    entered_at,
                },
            },
        };
        Ok(decision)
    }

    pub fn list_guests(&self) -> GateResult<Vec<JoinedGuest>> {
        Ok(self
            .read_retry
            .retry_blocking(|_| self.ledger.list_guests(), LedgerError::is_transient)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_types::GuestDetails;
    use ledger::LedgerConfig;
    use tempfile::{tempdir, TempDir};

    fn gate_with_roster(tokens: &[&str]) -> (TempDir, EntryGate) {
        let dir = tempdir().unwrap();
        let (controller, _) =
            LedgerController::bootstrap(LedgerConfig::new(dir.path().to_path_buf())).unwrap();
        let rows: Vec<GuestDetails> = tokens
            .iter()
            .map(|token| GuestDetails {
                display_name: Some(format!("Guest {token}")),
                token: Some(token.to_string()),
                ..GuestDetails::default()
            })
            .collect();
        controller
            .append_roster(&rows, Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap())
            .unwrap();
        (dir, EntryGate::new(Arc::new(controller)))
    }

    #[test]
    fn empty_token_is_invalid_request() {
        let (_dir, gate) = gate_with_roster(&["A"]);
        assert!(gate.verify("").unwrap_err().is_invalid_request());
        assert!(gate.admit("").unwrap_err().is_invalid_request());
    }

    #[test]
    fn verify_walks_not_found_allowed_already_entered() {
        let (_dir, gate) = gate_with_roster(&["A"]);
        assert_eq!(gate.verify("missing").unwrap(), Verification::NotFound);

        let allowed = gate.verify("A").unwrap();
        assert!(matches!(allowed, Verification::Allowed { .. }));
        assert_eq!(allowed.person().unwrap().display_name(), Some("Guest A"));
        assert_eq!(allowed.message(), "Access Granted");

        let admission = gate.admit("A").unwrap();
        assert!(admission.is_admitted());
        match gate.verify("A").unwrap() {
            Verification::AlreadyEntered { entered_at, .. } => {
                assert_eq!(entered_at, admission.entered_at())
            }
            other => panic!("expected already_entered, got {other:?}"),
        }
    }

    #[test]
    fn verify_has_no_side_effects() {
        let (_dir, gate) = gate_with_roster(&["A"]);
        for _ in 0..3 {
            assert!(matches!(gate.verify("A").unwrap(), Verification::Allowed { .. }));
        }
        assert_eq!(gate.ledger().entry_count().unwrap(), 0);
    }

    #[test]
    fn second_admit_reports_original_time() {
        let (_dir, gate) = gate_with_roster(&["A"]);
        let first = gate.admit("A").unwrap();
        let second = gate.admit("A").unwrap();
        assert_eq!(
            second,
            Admission::AlreadyEntered {
                entered_at: first.entered_at()
            }
        );
        assert_eq!(gate.ledger().entry_count().unwrap(), 1);
    }

    #[test]
    fn scan_trims_and_admits_once() {
        let (_dir, gate) = gate_with_roster(&["A"]);
        let first = gate.scan("  A\n");
        assert!(first.opens_gate());
        match gate.scan("A") {
            ScanDecision::AlreadyEntered { person, .. } => assert!(person.is_some()),
            other => panic!("expected already_entered, got {other:?}"),
        }
        assert_eq!(gate.scan("nobody"), ScanDecision::NotFound);
    }

    #[test]
    fn scan_denies_blank_input() {
        let (_dir, gate) = gate_with_roster(&["A"]);
        match gate.scan("   ") {
            ScanDecision::Denied { reason } => assert!(reason.contains("scan token is required")),
            other => panic!("expected denied, got {other:?}"),
        }
    }

    #[test]
    fn verification_serializes_with_status_tag() {
        let (_dir, gate) = gate_with_roster(&["A"]);
        let json = serde_json::to_value(gate.verify("A").unwrap()).unwrap();
        assert_eq!(json["status"], "allowed");
        assert_eq!(json["person"]["token"], "A");

        let json = serde_json::to_value(gate.verify("zzz").unwrap()).unwrap();
        assert_eq!(json["status"], "not_found");
        assert!(json.get("person").is_none());
    }
}
