use std::{fs, path::PathBuf, time::Duration};

use core_types::config::LedgerSettings;

use crate::error::{LedgerError, Result};

pub const DATABASE_FILE: &str = "guest-ledger.sqlite3";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub state_dir: PathBuf,
    pub busy_timeout: Duration,
}

impl LedgerConfig {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &LedgerSettings) -> Self {
        Self {
            state_dir: settings.state_dir.clone(),
            busy_timeout: Duration::from_millis(settings.busy_timeout_ms),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join(DATABASE_FILE)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).map_err(|source| LedgerError::StateDir {
                path: self.state_dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
