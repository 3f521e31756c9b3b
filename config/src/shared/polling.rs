use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Timeouts used while waiting for asynchronous operations on the Propel side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollingConfig {
    /// How long a newly created table may take to become connected, in seconds.
    #[serde(default = "default_table_connect_timeout_secs")]
    pub table_connect_timeout_secs: u64,
    /// How long a deletion job or a table deletion may take, in seconds.
    #[serde(default = "default_deletion_timeout_secs")]
    pub deletion_timeout_secs: u64,
    /// Delay between two status probes, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl PollingConfig {
    pub const DEFAULT_TABLE_CONNECT_TIMEOUT_SECS: u64 = 3 * 60;

    pub const DEFAULT_DELETION_TIMEOUT_SECS: u64 = 20 * 60;

    pub const DEFAULT_DELAY_MS: u64 = 3_000;

    pub fn table_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.table_connect_timeout_secs)
    }

    pub fn deletion_timeout(&self) -> Duration {
        Duration::from_secs(self.deletion_timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Validates polling settings.
    ///
    /// A zero delay would turn every wait into a busy loop against the API.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.delay_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "polling.delay_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            table_connect_timeout_secs: default_table_connect_timeout_secs(),
            deletion_timeout_secs: default_deletion_timeout_secs(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_table_connect_timeout_secs() -> u64 {
    PollingConfig::DEFAULT_TABLE_CONNECT_TIMEOUT_SECS
}

fn default_deletion_timeout_secs() -> u64 {
    PollingConfig::DEFAULT_DELETION_TIMEOUT_SECS
}

fn default_delay_ms() -> u64 {
    PollingConfig::DEFAULT_DELAY_MS
}
