//! Roster store and entry ledger for the guest gate.
//!
//! The crate exposes:
//! - [`LedgerController`]: shared handle over the SQLite database holding both tables.
//! - [`EntryWrite`]: result of an atomic insert-if-absent into the entry ledger.
//! - [`StorageReport`]: what bootstrap found or created on disk.

pub mod config;
pub mod controller;
pub mod entries;
pub mod error;
pub mod roster;
pub mod storage;

pub use config::LedgerConfig;
pub use controller::LedgerController;
pub use entries::EntryWrite;
pub use error::{LedgerError, Result};
pub use storage::{StorageReport, SCHEMA_VERSION};
