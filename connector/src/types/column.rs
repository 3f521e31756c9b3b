use serde::{Deserialize, Serialize};
use std::fmt;

/// Column types supported by Propel Data Sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Boolean,
    Double,
    Int64,
    Json,
    Date,
    Timestamp,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Boolean => "BOOLEAN",
            DataType::Double => "DOUBLE",
            DataType::Int64 => "INT64",
            DataType::Json => "JSON",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of a webhook Data Source.
///
/// `json_property` names the key of the posted event the column is read from; the connector
/// always uses the column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInput {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: DataType,
    pub nullable: bool,
    pub json_property: String,
}

impl ColumnInput {
    pub fn new(name: impl Into<String>, typ: DataType, nullable: bool) -> Self {
        let name = name.into();

        Self {
            json_property: name.clone(),
            name,
            typ,
            nullable,
        }
    }
}
