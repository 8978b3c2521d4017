// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of positional columns an upload row maps onto.
pub const ROSTER_COLUMNS: usize = 8;

/// Opaque value encoded in a guest's QR code; the join key between roster and ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanToken(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scan token is required")]
pub struct InvalidToken;

impl ScanToken {
    /// Accepts any non-empty string unchanged.
    pub fn parse(raw: &str) -> Result<Self, InvalidToken> {
        if raw.is_empty() {
            return Err(InvalidToken);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive attributes carried through unmodified from an upload row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDetails {
    pub responsibility: Option<String>,
    pub district: Option<String>,
    pub constituency: Option<String>,
    pub constituency_number: Option<String>,
    pub station_number: Option<String>,
    pub display_name: Option<String>,
    pub file_name: Option<String>,
    pub token: Option<String>,
}

impl GuestDetails {
    /// Maps cells positionally; cells are trimmed and blanks become `None`.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Self {
        let cell = |idx: usize| -> Option<String> {
            cells
                .get(idx)
                .map(|value| value.as_ref().trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            responsibility: cell(0),
            district: cell(1),
            constituency: cell(2),
            constituency_number: cell(3),
            station_number: cell(4),
            display_name: cell(5),
            file_name: cell(6),
            token: cell(7),
        }
    }
}

/// Primary key of a roster row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RosterId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: RosterId,
    #[serde(flatten)]
    pub details: GuestDetails,
    pub created_at: DateTime<Utc>,
}

impl RosterEntry {
    pub fn display_name(&self) -> Option<&str> {
        self.details.display_name.as_deref()
    }
}

/// One admission. At most one exists per token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub token: ScanToken,
    pub entered_at: DateTime<Utc>,
}

/// Roster row joined with its admission time, if any. Derived per read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedGuest {
    #[serde(flatten)]
    pub entry: RosterEntry,
    pub entered_at: Option<DateTime<Utc>>,
}

impl JoinedGuest {
    pub fn has_entered(&self) -> bool {
        self.entered_at.is_some()
    }
}
