use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Batching limits applied to each destination table.
///
/// A batch is flushed as soon as adding one more record would exceed either limit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum cumulative serialized size of a batch, in bytes.
    #[serde(default = "default_batch_max_bytes")]
    pub max_bytes: usize,
    /// Maximum number of records in a batch.
    #[serde(default = "default_batch_max_records")]
    pub max_records: usize,
}

impl BatchConfig {
    /// Default byte ceiling, kept just under the 1 MiB request limit of the ingestion endpoint.
    pub const DEFAULT_MAX_BYTES: usize = 1_047_000;

    /// Default record ceiling.
    pub const DEFAULT_MAX_RECORDS: usize = 10_000;

    /// Validates batch configuration settings.
    ///
    /// Both limits must be non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_bytes == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_bytes".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_records == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_records".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_batch_max_bytes(),
            max_records: default_batch_max_records(),
        }
    }
}

fn default_batch_max_bytes() -> usize {
    BatchConfig::DEFAULT_MAX_BYTES
}

fn default_batch_max_records() -> usize {
    BatchConfig::DEFAULT_MAX_RECORDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(BatchConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let config = BatchConfig {
            max_bytes: 0,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BatchConfig {
            max_records: 0,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
