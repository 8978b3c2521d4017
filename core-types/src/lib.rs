// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared guest, roster, and ledger types plus configuration for the entry gate.

pub mod config;
pub mod retry;
pub mod types;

pub use config::{AppConfig, ConfigError};
pub use retry::RetryPolicy;
pub use types::{
    EntryRecord, GuestDetails, InvalidToken, JoinedGuest, RosterEntry, RosterId, ScanToken,
    ROSTER_COLUMNS,
};
