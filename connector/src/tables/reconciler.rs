use std::collections::BTreeMap;

use airbyte::{ConfiguredCatalog, ConfiguredStream, DestinationSyncMode, LogLevel, Logger};
use config::shared::PollingConfig;
use secrecy::SecretString;
use tracing::{debug, info};

use crate::bail;
use crate::clients::ApiClient;
use crate::concurrency::poll::{PollOptions, poll_until_state};
use crate::conversions::types::convert_property_type;
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::tables::credentials::generate_password;
use crate::tables::deletion::purge_extracted_rows;
use crate::types::{
    BasicAuth, ColumnInput, CreateDataSourceOpts, DataSource, EXTRACTED_AT_COLUMN, RAW_ID_COLUMN,
    ReplacingMergeTree, TableSettings, data_source_status, data_source_unique_name,
    synthetic_columns,
};

const CONNECT_PENDING: &[&str] = &[data_source_status::CREATED, data_source_status::CONNECTING];
const CONNECT_TARGET: &[&str] = &[data_source_status::CONNECTED];

/// Data Sources ready to receive the records of a sync.
#[derive(Debug, Clone)]
pub struct ReconciledTables {
    /// Data Sources keyed by unique name.
    pub tables: BTreeMap<String, DataSource>,
    /// Whether every configured stream is synced in overwrite mode.
    pub full_reset_candidate: bool,
}

/// Brings the Data Source of every configured stream in line with its sync mode.
#[derive(Debug)]
pub struct TableReconciler<'a, A, L> {
    api: &'a A,
    logger: &'a L,
    polling: &'a PollingConfig,
}

impl<'a, A, L> TableReconciler<'a, A, L>
where
    A: ApiClient,
    L: Logger,
{
    pub fn new(api: &'a A, logger: &'a L, polling: &'a PollingConfig) -> Self {
        Self {
            api,
            logger,
            polling,
        }
    }

    /// Reconciles the streams of `catalog` in order, stopping at the first failure.
    ///
    /// Missing Data Sources are created and awaited until connected. Existing Data Sources of
    /// overwrite streams have their previously extracted rows deleted. Every Data Source is then
    /// checked against the sync mode of its stream.
    pub async fn reconcile(&self, catalog: &ConfiguredCatalog) -> SyncResult<ReconciledTables> {
        let mut tables = BTreeMap::new();
        let mut full_reset_candidate = true;

        for stream in &catalog.streams {
            full_reset_candidate &= stream.destination_sync_mode == DestinationSyncMode::Overwrite;

            let unique_name = data_source_unique_name(&stream.stream.namespace, &stream.stream.name);
            let data_source = self.reconcile_stream(stream, &unique_name).await?;
            tables.insert(unique_name, data_source);
        }

        Ok(ReconciledTables {
            tables,
            full_reset_candidate,
        })
    }

    async fn reconcile_stream(
        &self,
        stream: &ConfiguredStream,
        unique_name: &str,
    ) -> SyncResult<DataSource> {
        let data_source = match self.api.fetch_data_source(unique_name).await? {
            None => {
                let password = SecretString::new(generate_password(&mut rand::thread_rng()));
                let opts = data_source_opts(stream, unique_name, password)?;
                self.create_data_source(&opts).await?
            }
            Some(data_source) => {
                debug!(data_source = %unique_name, "data source already exists");

                if stream.destination_sync_mode == DestinationSyncMode::Overwrite {
                    purge_extracted_rows(self.api, self.logger, self.polling, unique_name).await?;
                }

                data_source
            }
        };

        validate_sync_mode(stream.destination_sync_mode, &data_source)?;

        Ok(data_source)
    }

    async fn create_data_source(&self, opts: &CreateDataSourceOpts) -> SyncResult<DataSource> {
        let data_source = self.api.create_data_source(opts).await?;
        let api = self.api;
        let unique_name = opts.name.as_str();

        info!(data_source = %unique_name, "waiting for data source to connect");

        let connected = poll_until_state(
            PollOptions {
                pending: CONNECT_PENDING,
                target: CONNECT_TARGET,
                timeout: self.polling.table_connect_timeout(),
                delay: self.polling.delay(),
            },
            move || async move {
                let Some(data_source) = api.fetch_data_source(unique_name).await? else {
                    bail!(
                        ErrorKind::TableApiFailed,
                        "Data Source disappeared while connecting",
                        format!("data source {unique_name}")
                    );
                };

                let status = data_source.status.clone();
                Ok((Some(data_source), status))
            },
        )
        .await
        .map_err(|err| {
            sync_error!(
                err.kind(),
                "Data Source did not connect",
                format!("data source {unique_name}"),
                source: err
            )
        })?;

        self.logger.log(
            LogLevel::Info,
            format!("Data Source {unique_name} created and connected"),
        );

        Ok(connected.unwrap_or(data_source))
    }
}

/// Returns the primary key columns of `stream`.
///
/// Only top level columns can be used as primary key, nested paths are rejected.
fn primary_key_columns<'s>(
    stream: &'s ConfiguredStream,
    unique_name: &str,
) -> SyncResult<Vec<&'s str>> {
    stream
        .primary_key
        .iter()
        .map(|path| match path.as_slice() {
            [column] => Ok(column.as_str()),
            _ => Err(sync_error!(
                ErrorKind::InvalidPrimaryKey,
                "Primary key paths must reference a single top level column",
                format!(
                    "path of length {} for data source {unique_name}",
                    path.len()
                )
            )),
        })
        .collect()
}

/// Builds the creation request of the Data Source backing `stream`.
///
/// De-duplicating streams with both a primary key and a cursor get a replacing merge tree ordered
/// by the primary key and versioned by the cursor. Every other stream gets the append shape,
/// unique on the raw id column.
pub fn data_source_opts(
    stream: &ConfiguredStream,
    unique_name: &str,
    password: SecretString,
) -> SyncResult<CreateDataSourceOpts> {
    let primary_key = primary_key_columns(stream, unique_name)?;
    let cursor = stream.cursor_field.first().map(String::as_str);
    let dedup = stream.destination_sync_mode == DestinationSyncMode::AppendDedup;

    if dedup && primary_key.is_empty() {
        bail!(
            ErrorKind::MissingPrimaryKey,
            "Append dedup sync mode requires at least one primary key column",
            format!("data source {unique_name}")
        );
    }

    let mut columns = Vec::with_capacity(stream.stream.json_schema.properties.len() + 2);
    for (name, property) in &stream.stream.json_schema.properties {
        let typ = convert_property_type(&property.property_type).map_err(|err| {
            sync_error!(
                err.kind(),
                "Column type conversion failed",
                format!("column {name} of data source {unique_name}"),
                source: err
            )
        })?;
        let nullable = !primary_key.contains(&name.as_str()) && cursor != Some(name.as_str());

        columns.push(ColumnInput::new(name.as_str(), typ, nullable));
    }
    columns.extend(synthetic_columns());

    let mut opts = CreateDataSourceOpts {
        name: unique_name.to_string(),
        basic_auth: BasicAuth {
            username: stream.stream.namespace.clone(),
            password,
        },
        columns,
        timestamp: None,
        unique_id: None,
        table_settings: None,
    };

    match (dedup, primary_key.first(), cursor) {
        (true, Some(first_key), Some(cursor)) => {
            opts.unique_id = Some(first_key.to_string());
            opts.table_settings = Some(TableSettings {
                primary_key: Vec::new(),
                partition_by: Vec::new(),
                order_by: primary_key.iter().map(|column| column.to_string()).collect(),
                engine: Some(ReplacingMergeTree {
                    ver: cursor.to_string(),
                }),
            });
        }
        _ => {
            opts.timestamp = Some(EXTRACTED_AT_COLUMN.to_string());
            opts.unique_id = Some(RAW_ID_COLUMN.to_string());
        }
    }

    Ok(opts)
}

/// Checks that the shape of an existing Data Source agrees with the sync mode of its stream.
pub fn validate_sync_mode(mode: DestinationSyncMode, data_source: &DataSource) -> SyncResult<()> {
    let raw_id_unique = data_source.unique_id() == Some(RAW_ID_COLUMN);

    match mode {
        DestinationSyncMode::AppendDedup if raw_id_unique => bail!(
            ErrorKind::SyncModeMismatch,
            "Append dedup sync mode is not compatible with the Data Source unique id",
            format!(
                "data source {} is unique on {RAW_ID_COLUMN}",
                data_source.unique_name
            )
        ),
        DestinationSyncMode::Append if !raw_id_unique => bail!(
            ErrorKind::SyncModeMismatch,
            "Append sync mode is not compatible with the Data Source ordering",
            format!(
                "data source {} is de-duplicated on {}",
                data_source.unique_name,
                data_source.unique_id().unwrap_or("<none>")
            )
        ),
        _ => Ok(()),
    }
}
