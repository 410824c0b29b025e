use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::domain::{Error, Money};

/// Ledger policy and tuning. Every field has a default so partial files load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub starting_balance: Money,
    /// Balance at which an account in free play returns to real-money play.
    pub reinstatement_threshold: Money,
    pub free_play_cooldown_secs: u64,
    pub retention_secs: u64,
    pub max_commit_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub store_timeout_ms: u64,
    pub maintenance_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: Money::from_major(1000),
            reinstatement_threshold: Money::from_major(100),
            free_play_cooldown_secs: 60 * 60,
            retention_secs: 12 * 60 * 60,
            max_commit_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 500,
            store_timeout_ms: 5_000,
            maintenance_interval_secs: 12 * 60 * 60,
        }
    }
}

impl LedgerConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("could not parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.starting_balance.is_negative() {
            return Err(Error::Config("starting_balance must not be negative".into()));
        }
        if self.reinstatement_threshold.is_negative() {
            return Err(Error::Config(
                "reinstatement_threshold must not be negative".into(),
            ));
        }
        ensure_nonzero("retention_secs", self.retention_secs)?;
        ensure_nonzero("max_commit_attempts", u64::from(self.max_commit_attempts))?;
        ensure_nonzero("store_timeout_ms", self.store_timeout_ms)?;
        ensure_nonzero("maintenance_interval_secs", self.maintenance_interval_secs)?;
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::Config(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn free_play_cooldown(&self) -> Duration {
        Duration::from_secs(self.free_play_cooldown_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), Error> {
    if value == 0 {
        return Err(Error::Config(format!("{} must be non-zero", field)));
    }
    Ok(())
}
