use std::io::{self, Stdout};
use std::path::{Path, PathBuf};

use airbyte::{CheckStatus, ConfiguredCatalog, ConnectionStatus, LogLevel, Logger, MessageWriter};
use anyhow::{Context, Result};
use clap::Subcommand;
use config::load_config_from_path;
use config::shared::DestinationConfig;
use connector::clients::propel::{PropelOAuthClient, PropelWebhookClient};
use connector::destination::{Destination, parse_catalog, specification};
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print the connector specification
    Spec,
    /// Verify that the configured credentials can obtain an access token
    Check {
        /// Path to the JSON configuration file
        #[arg(long)]
        config: PathBuf,
    },
    /// Write the records read from stdin into Propel
    Write {
        /// Path to the JSON configuration file
        #[arg(long)]
        config: PathBuf,
        /// Path to the JSON configured catalog
        #[arg(long)]
        catalog: PathBuf,
    },
}

impl Command {
    pub(crate) async fn run(self) -> Result<()> {
        let logger = MessageWriter::new(io::stdout());

        match self {
            Command::Spec => {
                logger.spec(&specification())?;
                Ok(())
            }
            Command::Check { config } => check(logger, &config).await,
            Command::Write { config, catalog } => write(logger, &config, &catalog).await,
        }
    }
}

fn clients(config: &DestinationConfig) -> Result<(PropelOAuthClient, PropelWebhookClient)> {
    let oauth = PropelOAuthClient::new(&config.api).context("failed to build the API client")?;
    let webhook = PropelWebhookClient::new().context("failed to build the webhook client")?;

    Ok((oauth, webhook))
}

/// Runs `check`, reporting every failure through the connection status.
async fn check(logger: MessageWriter<Stdout>, config_path: &Path) -> Result<()> {
    let config: DestinationConfig = match load_config_from_path(config_path) {
        Ok(config) => config,
        Err(err) => {
            logger.log(LogLevel::Error, format!("Configuration could not be loaded: {err}"));
            logger.connection_status(&ConnectionStatus {
                status: CheckStatus::Failed,
                message: Some(format!("Configuration for Propel is invalid: {err}")),
            })?;

            return Ok(());
        }
    };

    let (oauth, webhook) = match clients(&config) {
        Ok(clients) => clients,
        Err(err) => {
            logger.log(LogLevel::Error, format!("{err:#}"));
            logger.connection_status(&ConnectionStatus {
                status: CheckStatus::Failed,
                message: Some(format!("Could not connect to Propel: {err:#}")),
            })?;

            return Ok(());
        }
    };

    let destination = Destination::new(oauth, webhook, logger);
    let status = destination.check(&config).await;
    destination.logger().connection_status(&status)?;

    Ok(())
}

/// Runs `write`, reading the messages to sync from stdin.
///
/// A fatal error is reported once as an `ERROR` log message before the process exits with a
/// failure.
async fn write(logger: MessageWriter<Stdout>, config_path: &Path, catalog_path: &Path) -> Result<()> {
    let inputs = load_config_from_path::<DestinationConfig>(config_path)
        .map_err(anyhow::Error::from)
        .and_then(|config| {
            let catalog = load_catalog(catalog_path)?;
            let clients = clients(&config)?;
            Ok((config, catalog, clients))
        });
    let (config, catalog, (oauth, webhook)) = match inputs {
        Ok(inputs) => inputs,
        Err(err) => {
            logger.log(LogLevel::Error, format!("{err:#}"));
            return Err(err);
        }
    };

    let destination = Destination::new(oauth, webhook, logger);
    let input = BufReader::new(tokio::io::stdin());

    match destination.write(&config, &catalog, input).await {
        Ok(records) => {
            info!(records, "sync completed");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "sync failed");
            destination.logger().log(LogLevel::Error, err.to_string());
            Err(err.into())
        }
    }
}

fn load_catalog(path: &Path) -> Result<ConfiguredCatalog> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog `{}`", path.display()))?;

    parse_catalog(&contents)
        .with_context(|| format!("failed to parse catalog `{}`", path.display()))
}
