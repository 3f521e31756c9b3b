use std::collections::BTreeMap;

use airbyte::{
    ConfiguredCatalog, ConfiguredStream, DestinationSyncMode, JsonSchema, PropType, PropertySpec,
    PropertyType, Stream, SyncMode, TypeSet,
};

/// Builds a [`ConfiguredCatalog`] out of `streams`.
pub fn catalog(streams: Vec<ConfiguredStream>) -> ConfiguredCatalog {
    ConfiguredCatalog { streams }
}

/// Builder for [`ConfiguredStream`]s.
///
/// Streams default to the append sync mode, with no primary key and no cursor.
#[derive(Debug, Clone)]
pub struct StreamBuilder {
    namespace: String,
    name: String,
    properties: BTreeMap<String, PropertySpec>,
    primary_key: Vec<Vec<String>>,
    cursor_field: Vec<String>,
    mode: DestinationSyncMode,
}

impl StreamBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            properties: BTreeMap::new(),
            primary_key: Vec::new(),
            cursor_field: Vec::new(),
            mode: DestinationSyncMode::Append,
        }
    }

    /// Declares a nullable property of JSON schema type `typ`.
    pub fn property(mut self, name: &str, typ: &str) -> Self {
        let property = PropertySpec {
            property_type: PropertyType {
                types: TypeSet(vec![PropType::Null, PropType::from(typ.to_string())]),
                format: None,
                airbyte_type: None,
            },
            title: None,
            description: None,
        };
        self.properties.insert(name.to_string(), property);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|column| vec![column.to_string()]).collect();
        self
    }

    pub fn cursor(mut self, column: &str) -> Self {
        self.cursor_field = vec![column.to_string()];
        self
    }

    pub fn mode(mut self, mode: DestinationSyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> ConfiguredStream {
        let sync_mode = match self.mode {
            DestinationSyncMode::Overwrite => SyncMode::FullRefresh,
            DestinationSyncMode::Append | DestinationSyncMode::AppendDedup => {
                SyncMode::Incremental
            }
        };

        ConfiguredStream {
            stream: Stream {
                name: self.name,
                namespace: self.namespace,
                json_schema: JsonSchema {
                    properties: self.properties,
                },
                supported_sync_modes: vec![SyncMode::FullRefresh, SyncMode::Incremental],
                source_defined_cursor: false,
                default_cursor_field: Vec::new(),
                source_defined_primary_key: Vec::new(),
            },
            sync_mode,
            cursor_field: self.cursor_field,
            destination_sync_mode: self.mode,
            primary_key: self.primary_key,
        }
    }
}
