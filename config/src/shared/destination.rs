use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::shared::{ApiConfig, BatchConfig, PollingConfig, ValidationError};

/// Configuration of the Propel destination.
///
/// The credentials identify a Propel application allowed to manage Data Pools and Data Sources.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DestinationConfig {
    /// Propel application id.
    pub application_id: String,
    /// Propel application secret.
    pub application_secret: SecretString,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl DestinationConfig {
    /// Validates the whole configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.application_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("application_id".to_string()));
        }

        if self.application_secret.expose_secret().is_empty() {
            return Err(ValidationError::EmptyField(
                "application_secret".to_string(),
            ));
        }

        self.batch.validate()?;
        self.polling.validate()?;

        Ok(())
    }
}
