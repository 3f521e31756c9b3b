use secrecy::SecretString;

use crate::types::{
    BasicAuth, ColumnInput, DataSource, DataType, EXTRACTED_AT_COLUMN, RAW_ID_COLUMN,
    ReplacingMergeTree, TableSettings, WebhookConnectionSettings, data_source_status,
    synthetic_columns,
};

/// Returns the webhook URL the test doubles assign to a Data Source.
pub fn webhook_url(unique_name: &str) -> String {
    format!("https://webhooks.propel.test/v1/{unique_name}")
}

fn data_source(
    unique_name: &str,
    timestamp: Option<&str>,
    unique_id: &str,
    table_settings: Option<TableSettings>,
) -> DataSource {
    let username = unique_name
        .split_once('_')
        .map(|(namespace, _)| namespace)
        .unwrap_or_default();

    DataSource {
        id: format!("DSO-{unique_name}"),
        unique_name: unique_name.to_string(),
        status: data_source_status::CONNECTED.to_string(),
        connection_settings: WebhookConnectionSettings {
            webhook_url: webhook_url(unique_name),
            basic_auth: Some(BasicAuth {
                username: username.to_string(),
                password: SecretString::new("test-password".to_string()),
            }),
            columns: synthetic_columns().to_vec(),
            timestamp: timestamp.map(str::to_owned),
            unique_id: Some(unique_id.to_string()),
            table_settings,
        },
    }
}

/// A connected Data Source with the append shape, unique on the raw id column.
pub fn append_data_source(unique_name: &str) -> DataSource {
    data_source(
        unique_name,
        Some(EXTRACTED_AT_COLUMN),
        RAW_ID_COLUMN,
        None,
    )
}

/// A connected de-duplicating Data Source ordered by `primary_key` and versioned by `cursor`.
pub fn dedup_data_source(unique_name: &str, primary_key: &[&str], cursor: &str) -> DataSource {
    let order_by: Vec<String> = primary_key.iter().map(|column| column.to_string()).collect();
    let unique_id = primary_key.first().copied().unwrap_or_default();

    let mut data_source = data_source(
        unique_name,
        None,
        unique_id,
        Some(TableSettings {
            primary_key: Vec::new(),
            partition_by: Vec::new(),
            order_by,
            engine: Some(ReplacingMergeTree {
                ver: cursor.to_string(),
            }),
        }),
    );
    data_source
        .connection_settings
        .columns
        .extend(
            primary_key
                .iter()
                .map(|column| ColumnInput::new(*column, DataType::String, false)),
        );

    data_source
}
