use ::config::shared::{ApiConfig, BatchConfig, DestinationConfig, PollingConfig};
use secrecy::SecretString;

/// Returns a valid configuration authenticating as `APP123` with `application_secret`.
///
/// Polling uses a short delay so paused-clock tests advance quickly.
pub fn destination_config(application_secret: &str) -> DestinationConfig {
    DestinationConfig {
        application_id: "APP123".to_string(),
        application_secret: SecretString::new(application_secret.to_string()),
        batch: BatchConfig::default(),
        polling: PollingConfig {
            delay_ms: 10,
            ..PollingConfig::default()
        },
        api: ApiConfig::default(),
    }
}
