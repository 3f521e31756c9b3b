use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::types::{ColumnInput, DataType, SizeHint};

/// Synthetic column holding the deterministic identity of a record.
pub const RAW_ID_COLUMN: &str = "_airbyte_raw_id";

/// Synthetic column holding the emission time of a record.
pub const EXTRACTED_AT_COLUMN: &str = "_airbyte_extracted_at";

/// Columns appended to every Data Source created by the connector.
pub fn synthetic_columns() -> [ColumnInput; 2] {
    [
        ColumnInput::new(RAW_ID_COLUMN, DataType::String, false),
        ColumnInput::new(EXTRACTED_AT_COLUMN, DataType::Timestamp, false),
    ]
}

/// Returns the unique name of the Data Source a stream is written to.
pub fn data_source_unique_name(namespace: &str, stream_name: &str) -> String {
    format!("{namespace}_{stream_name}")
}

/// Computes the raw id of a record.
///
/// The id is the first 16 bytes of a SHA-256 digest over the NUL-separated namespace, stream
/// name, zero-based record index and emission timestamp, rendered as a hyphenated UUID. The same
/// record delivered at the same position always gets the same id.
pub fn raw_id(namespace: &str, stream_name: &str, record_index: u64, emitted_at: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update([0]);
    hasher.update(stream_name.as_bytes());
    hasher.update([0]);
    hasher.update(record_index.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(emitted_at.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);

    Uuid::from_bytes(bytes).hyphenated().to_string()
}

/// A record augmented with the synthetic columns, ready to be posted.
///
/// The delivered size is computed once at construction: the length of the JSON encoding plus one
/// byte for the separator.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEvent {
    payload: Map<String, Value>,
    size_hint_bytes: usize,
}

impl TableEvent {
    /// Builds the event for `data`, injecting the raw id and extracted-at columns.
    pub fn new(
        namespace: &str,
        stream_name: &str,
        record_index: u64,
        emitted_at: i64,
        mut data: Map<String, Value>,
    ) -> SyncResult<Self> {
        data.insert(
            RAW_ID_COLUMN.to_string(),
            Value::String(raw_id(namespace, stream_name, record_index, emitted_at)),
        );
        data.insert(EXTRACTED_AT_COLUMN.to_string(), Value::from(emitted_at));

        let size_hint_bytes = serde_json::to_vec(&data)
            .map_err(|err| {
                sync_error!(
                    ErrorKind::SerializationError,
                    "Record could not be serialized",
                    source: err
                )
            })?
            .len()
            + 1;

        Ok(Self {
            payload: data,
            size_hint_bytes,
        })
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn into_payload(self) -> Map<String, Value> {
        self.payload
    }
}

impl SizeHint for TableEvent {
    fn size_hint(&self) -> usize {
        self.size_hint_bytes
    }
}
