// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "guest-gate.toml";
pub const ENV_PREFIX: &str = "GATE";
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("ledger.busy_timeout_ms must be greater than zero")]
    ZeroBusyTimeout,
    #[error("analytics.utc_offset_minutes {value} outside +/-1080")]
    OffsetOutOfRange { value: i32 },
}

/// Root configuration for the gate binary and its services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("gate.state")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// `utc_offset_minutes = None` means the host's local zone defines a calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyticsSettings {
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_pct: default_jitter_pct(),
        }
    }
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    1_000
}

fn default_jitter_pct() -> f64 {
    0.2
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_pct,
        )
    }
}

impl AppConfig {
    /// Layers `guest-gate.toml` (or `path`) under `GATE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.busy_timeout_ms == 0 {
            return Err(ConfigError::ZeroBusyTimeout);
        }
        if let Some(value) = self.analytics.utc_offset_minutes {
            if value.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(ConfigError::OffsetOutOfRange { value });
            }
        }
        Ok(())
    }
}
