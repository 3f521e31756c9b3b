use secrecy::SecretString;
use serde::Deserialize;

use crate::types::ColumnInput;

/// Status labels reported for Data Sources.
pub mod data_source_status {
    pub const CREATED: &str = "CREATED";
    pub const CONNECTING: &str = "CONNECTING";
    pub const CONNECTED: &str = "CONNECTED";
    pub const DELETING: &str = "DELETING";
    pub const DELETED: &str = "DELETED";
}

/// Status labels reported for Data Pools.
pub mod data_pool_status {
    pub const DELETING: &str = "DELETING";
    pub const DELETED: &str = "DELETED";
}

/// Status labels reported for deletion jobs.
pub mod job_status {
    pub const CREATED: &str = "CREATED";
    pub const IN_PROGRESS: &str = "IN_PROGRESS";
    pub const SUCCEEDED: &str = "SUCCEEDED";
    pub const FAILED: &str = "FAILED";
}

/// HTTP Basic credentials protecting a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: SecretString,
}

/// Replacing merge tree engine: rows sharing the same ordering key are collapsed, keeping the one
/// with the highest `ver` value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplacingMergeTree {
    #[serde(default)]
    pub ver: String,
}

/// Physical table layout of a de-duplicating Data Pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSettings {
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub partition_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<String>,
    pub engine: Option<ReplacingMergeTree>,
}

/// Connection settings of a webhook Data Source.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConnectionSettings {
    pub webhook_url: String,
    pub basic_auth: Option<BasicAuth>,
    #[serde(default)]
    pub columns: Vec<ColumnInput>,
    pub timestamp: Option<String>,
    pub unique_id: Option<String>,
    pub table_settings: Option<TableSettings>,
}

/// A webhook Data Source, the destination table of a stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    pub unique_name: String,
    pub status: String,
    pub connection_settings: WebhookConnectionSettings,
}

impl DataSource {
    /// Returns the column used as unique id, if any.
    pub fn unique_id(&self) -> Option<&str> {
        self.connection_settings.unique_id.as_deref()
    }

    pub fn webhook_url(&self) -> &str {
        &self.connection_settings.webhook_url
    }
}

/// The storage resource backing a Data Source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPool {
    pub id: String,
    pub unique_name: String,
    pub status: String,
}

/// An asynchronous server side job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: String,
}

/// Comparison operators accepted by deletion job filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    LessThanOrEqualTo,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
        }
    }
}

/// A row filter selecting the rows a deletion job removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterInput {
    pub column: String,
    pub operator: FilterOperator,
    pub value: String,
}

/// Everything needed to create a webhook Data Source.
#[derive(Debug, Clone)]
pub struct CreateDataSourceOpts {
    pub name: String,
    pub basic_auth: BasicAuth,
    pub columns: Vec<ColumnInput>,
    pub timestamp: Option<String>,
    pub unique_id: Option<String>,
    pub table_settings: Option<TableSettings>,
}
