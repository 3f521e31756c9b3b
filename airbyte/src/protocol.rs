//! Serde model of the Airbyte protocol messages used by destinations.
//!
//! See <https://docs.airbyte.com/understanding-airbyte/airbyte-protocol> for the full protocol.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A single protocol envelope.
///
/// The `type` field selects the variant. Destinations act on [`Message::Record`] and
/// [`Message::State`]; the remaining kinds are either emitted by the connector itself or passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Record {
        record: Record,
    },
    State {
        state: State,
    },
    Log {
        log: LogMessage,
    },
    Spec {
        spec: Value,
    },
    ConnectionStatus {
        #[serde(rename = "connectionStatus")]
        connection_status: ConnectionStatus,
    },
    Catalog {
        catalog: Value,
    },
    Trace {
        trace: Value,
    },
    Control {
        control: Value,
    },
}

impl Message {
    /// Returns the protocol name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Record { .. } => "RECORD",
            Message::State { .. } => "STATE",
            Message::Log { .. } => "LOG",
            Message::Spec { .. } => "SPEC",
            Message::ConnectionStatus { .. } => "CONNECTION_STATUS",
            Message::Catalog { .. } => "CATALOG",
            Message::Trace { .. } => "TRACE",
            Message::Control { .. } => "CONTROL",
        }
    }
}

/// Reads a string that sources without namespaces send as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Log levels understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

/// A data point emitted by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub namespace: String,
    pub stream: String,
    pub data: Map<String, Value>,
    /// Emission time in milliseconds since the Unix epoch.
    pub emitted_at: i64,
}

/// Opaque checkpoint emitted by a source.
///
/// The payload is kept as raw JSON so that it can be echoed back to the platform byte for byte
/// once every record preceding it has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(pub Value);

/// Outcome of a connection check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How the destination must interpret incoming data for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSyncMode {
    Append,
    Overwrite,
    AppendDedup,
}

impl DestinationSyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationSyncMode::Append => "append",
            DestinationSyncMode::Overwrite => "overwrite",
            DestinationSyncMode::AppendDedup => "append_dedup",
        }
    }
}

impl fmt::Display for DestinationSyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    FullRefresh,
    Incremental,
}

/// Connector wide settings returned by the `spec` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSpecification {
    #[serde(rename = "documentationUrl", skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    #[serde(rename = "changelogUrl", skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
    #[serde(rename = "supportsIncremental")]
    pub supports_incremental: bool,
    #[serde(rename = "supportsNormalization")]
    pub supports_normalization: bool,
    #[serde(rename = "supportsDBT")]
    pub supports_dbt: bool,
    pub supported_destination_sync_modes: Vec<DestinationSyncMode>,
    #[serde(rename = "connectionSpecification")]
    pub connection_specification: Value,
}

/// A primitive JSON schema type as declared by a source.
///
/// Unknown type names are preserved so that they can be reported back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropType {
    String,
    Boolean,
    Number,
    Integer,
    Object,
    Array,
    Null,
    Other(String),
}

impl PropType {
    pub fn as_str(&self) -> &str {
        match self {
            PropType::String => "string",
            PropType::Boolean => "boolean",
            PropType::Number => "number",
            PropType::Integer => "integer",
            PropType::Object => "object",
            PropType::Array => "array",
            PropType::Null => "null",
            PropType::Other(other) => other,
        }
    }
}

impl From<String> for PropType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "string" => PropType::String,
            "boolean" => PropType::Boolean,
            "number" => PropType::Number,
            "integer" => PropType::Integer,
            "object" => PropType::Object,
            "array" => PropType::Array,
            "null" => PropType::Null,
            _ => PropType::Other(value),
        }
    }
}

impl From<PropType> for String {
    fn from(value: PropType) -> Self {
        match value {
            PropType::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The candidate types of a property.
///
/// JSON schema allows `type` to be either a single name or a list of names (nullable unions are
/// written as `["null", "string"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TypeSetRepr", into = "TypeSetRepr")]
pub struct TypeSet(pub Vec<PropType>);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TypeSetRepr {
    Single(PropType),
    Many(Vec<PropType>),
}

impl From<TypeSetRepr> for TypeSet {
    fn from(value: TypeSetRepr) -> Self {
        match value {
            TypeSetRepr::Single(typ) => TypeSet(vec![typ]),
            TypeSetRepr::Many(types) => TypeSet(types),
        }
    }
}

impl From<TypeSet> for TypeSetRepr {
    fn from(value: TypeSet) -> Self {
        let mut types = value.0;
        if types.len() == 1 {
            if let Some(typ) = types.pop() {
                return TypeSetRepr::Single(typ);
            }
        }

        TypeSetRepr::Many(types)
    }
}

/// Declared type of a stream property, including format hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    #[serde(rename = "type", default)]
    pub types: TypeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airbyte_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(flatten)]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
}

/// A table, collection or topic exposed by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub namespace: String,
    #[serde(default)]
    pub json_schema: JsonSchema,
    #[serde(default)]
    pub supported_sync_modes: Vec<SyncMode>,
    #[serde(default)]
    pub source_defined_cursor: bool,
    #[serde(default)]
    pub default_cursor_field: Vec<String>,
    #[serde(default)]
    pub source_defined_primary_key: Vec<Vec<String>>,
}

/// A stream selected for syncing together with its sync policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    pub stream: Stream,
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub cursor_field: Vec<String>,
    pub destination_sync_mode: DestinationSyncMode,
    #[serde(default)]
    pub primary_key: Vec<Vec<String>>,
}

/// The streams selected for a sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    pub streams: Vec<ConfiguredStream>,
}
