//! The Propel destination: the `spec`, `check` and `write` operations of the connector.

use airbyte::{
    CheckStatus, ConfiguredCatalog, ConnectionStatus, ConnectorSpecification, DestinationSyncMode,
    LogLevel, Logger,
};
use config::shared::DestinationConfig;
use serde_json::json;
use tokio::io::AsyncBufRead;
use tracing::info;

use crate::batching::BatchingPipeline;
use crate::clients::{OAuthClient, WebhookClient};
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::tables::TableReconciler;
use crate::tables::deletion::delete_tables;

const DOCUMENTATION_URL: &str = "https://propeldata.com/docs";

/// Returns the specification advertised by the `spec` command.
pub fn specification() -> ConnectorSpecification {
    ConnectorSpecification {
        documentation_url: Some(DOCUMENTATION_URL.to_string()),
        changelog_url: Some(DOCUMENTATION_URL.to_string()),
        supports_incremental: true,
        supports_normalization: false,
        supports_dbt: false,
        supported_destination_sync_modes: vec![
            DestinationSyncMode::Overwrite,
            DestinationSyncMode::Append,
            DestinationSyncMode::AppendDedup,
        ],
        connection_specification: json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Propel Destination Spec",
            "type": "object",
            "required": ["application_id", "application_secret"],
            "properties": {
                "application_id": {
                    "title": "Application ID",
                    "description": "Propel Application ID",
                    "type": "string",
                    "examples": ["APP00000000000000000000000000"],
                },
                "application_secret": {
                    "title": "Application secret",
                    "description": "Propel Application secret",
                    "type": "string",
                    "airbyte_secret": true,
                },
            },
        }),
    }
}

/// Parses the configured catalog handed to the `write` command.
pub fn parse_catalog(contents: &str) -> SyncResult<ConfiguredCatalog> {
    serde_json::from_str(contents).map_err(|err| {
        sync_error!(
            ErrorKind::InvalidCatalog,
            "Configured catalog could not be parsed",
            source: err
        )
    })
}

/// Drives the operations of the connector against Propel.
///
/// The OAuth client provides the API client used to manage tables, the webhook client delivers
/// the records and every protocol message goes through the logger.
#[derive(Debug)]
pub struct Destination<O, W, L> {
    oauth: O,
    webhook: W,
    logger: L,
}

impl<O, W, L> Destination<O, W, L>
where
    O: OAuthClient,
    W: WebhookClient,
    L: Logger,
{
    pub fn new(oauth: O, webhook: W, logger: L) -> Self {
        Self {
            oauth,
            webhook,
            logger,
        }
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn spec(&self) -> ConnectorSpecification {
        specification()
    }

    /// Verifies that an access token can be obtained with the configured credentials.
    ///
    /// Failures are reported in the returned status rather than as errors.
    pub async fn check(&self, config: &DestinationConfig) -> ConnectionStatus {
        self.logger
            .log(LogLevel::Debug, "Validating API connection");

        if let Err(err) = config.validate() {
            self.logger
                .log(LogLevel::Error, format!("Configuration is invalid: {err}"));

            return ConnectionStatus {
                status: CheckStatus::Failed,
                message: Some(format!("Configuration for Propel is invalid: {err}")),
            };
        }

        match self
            .oauth
            .authenticate(&config.application_id, &config.application_secret)
            .await
        {
            Ok(_) => ConnectionStatus {
                status: CheckStatus::Succeeded,
                message: Some("Successfully generated a Propel access token".to_string()),
            },
            Err(err) => {
                self.logger
                    .log(LogLevel::Error, format!("Access token request failed: {err}"));

                ConnectionStatus {
                    status: CheckStatus::Failed,
                    message: Some(format!("Generating a Propel access token failed: {err}")),
                }
            }
        }
    }

    /// Runs a sync of `catalog`, reading the messages to write from `input`.
    ///
    /// The Data Sources are reconciled before the first message is read. When every stream is
    /// synced in overwrite mode and the input holds no record, the sync is a full reset and every
    /// reconciled Data Source is deleted along with its Data Pool, so that the next sync can
    /// recreate them with the shape matching the new sync modes.
    ///
    /// Returns the number of records written.
    pub async fn write<R>(
        &self,
        config: &DestinationConfig,
        catalog: &ConfiguredCatalog,
        input: R,
    ) -> SyncResult<u64>
    where
        R: AsyncBufRead + Unpin,
    {
        self.logger.log(LogLevel::Debug, "Write records");

        config.validate().map_err(|err| {
            sync_error!(
                ErrorKind::ConfigError,
                "Configuration is invalid",
                source: err
            )
        })?;

        let api = self
            .oauth
            .authenticate(&config.application_id, &config.application_secret)
            .await?;

        let reconciled = TableReconciler::new(&api, &self.logger, &config.polling)
            .reconcile(catalog)
            .await?;

        info!(tables = reconciled.tables.len(), "data sources reconciled");

        let records =
            BatchingPipeline::new(&self.webhook, &self.logger, &config.batch, &reconciled.tables)
                .run(input)
                .await?;

        if reconciled.full_reset_candidate && records == 0 && !reconciled.tables.is_empty() {
            self.logger.log(
                LogLevel::Info,
                "Full reset sync, all Data Pools will be deleted.",
            );

            delete_tables(
                &api,
                &config.polling,
                reconciled.tables.keys().map(String::as_str),
            )
            .await?;
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::api::MockApiClient;
    use crate::test_utils::config::destination_config as config;
    use crate::test_utils::logger::MemoryLogger;
    use crate::test_utils::oauth::MockOAuthClient;
    use crate::test_utils::webhook::MockWebhookClient;

    fn destination(
        oauth: MockOAuthClient,
    ) -> Destination<MockOAuthClient, MockWebhookClient, MemoryLogger> {
        Destination::new(oauth, MockWebhookClient::new(), MemoryLogger::new())
    }

    #[test]
    fn specification_advertises_every_sync_mode() {
        let spec = destination(MockOAuthClient::default()).spec();

        assert_eq!(spec.documentation_url.as_deref(), Some(DOCUMENTATION_URL));
        assert_eq!(
            spec.supported_destination_sync_modes,
            vec![
                DestinationSyncMode::Overwrite,
                DestinationSyncMode::Append,
                DestinationSyncMode::AppendDedup,
            ]
        );
        assert_eq!(
            spec.connection_specification["required"],
            json!(["application_id", "application_secret"])
        );
        assert_eq!(
            spec.connection_specification["properties"]["application_secret"]["airbyte_secret"],
            json!(true)
        );
    }

    #[test]
    fn catalog_with_null_namespace_is_parsed() {
        let catalog = parse_catalog(
            r#"{
                "streams": [{
                    "stream": {"name": "users", "namespace": null, "json_schema": {}},
                    "sync_mode": "full_refresh",
                    "destination_sync_mode": "append"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.streams[0].stream.namespace, "");
        assert_eq!(catalog.streams[0].stream.name, "users");
    }

    #[test]
    fn malformed_catalog_is_an_invalid_catalog() {
        let err = parse_catalog(r#"{"streams": [{"stream": {}}]}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCatalog);

        let err = parse_catalog("not json").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCatalog);
    }

    #[tokio::test]
    async fn check_succeeds_with_valid_credentials() {
        let destination = destination(MockOAuthClient::new(MockApiClient::new()));

        let status = destination.check(&config("secret")).await;

        assert_eq!(status.status, CheckStatus::Succeeded);
    }

    #[tokio::test]
    async fn check_reports_rejected_credentials() {
        let destination = destination(MockOAuthClient::rejecting());

        let status = destination.check(&config("secret")).await;

        assert_eq!(status.status, CheckStatus::Failed);
        assert!(
            status
                .message
                .unwrap()
                .starts_with("Generating a Propel access token failed")
        );
        assert!(
            destination
                .logger()
                .contains(LogLevel::Error, "Access token request failed")
        );
    }

    #[tokio::test]
    async fn check_reports_invalid_configuration() {
        let destination = destination(MockOAuthClient::default());

        let status = destination.check(&config("")).await;

        assert_eq!(status.status, CheckStatus::Failed);
        assert!(status.message.unwrap().contains("application_secret"));
    }

    #[tokio::test]
    async fn write_fails_before_any_api_call_when_authentication_fails() {
        let destination = destination(MockOAuthClient::rejecting());

        let err = destination
            .write(&config("secret"), &ConfiguredCatalog::default(), &b""[..])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
    }

    #[tokio::test]
    async fn write_rejects_invalid_configuration() {
        let mut config = config("secret");
        config.batch.max_records = 0;

        let err = destination(MockOAuthClient::default())
            .write(&config, &ConfiguredCatalog::default(), &b""[..])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
