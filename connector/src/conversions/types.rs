use airbyte::{PropType, PropertyType};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::types::DataType;

const DATE_FORMAT: &str = "date";
const DATE_TIME_FORMAT: &str = "date-time";
const TIMESTAMP_WITHOUT_TIMEZONE: &str = "timestamp_without_timezone";

/// Maps the declared type of a stream property to the Propel column type storing it.
///
/// `null` is ignored when picking the type, since nullability is decided separately. Properties
/// with no remaining type or with a union of several types are stored as strings. Date and
/// date-time formats refine strings into `DATE` and `TIMESTAMP` columns, except for timestamps
/// without a timezone which stay strings.
pub fn convert_property_type(property: &PropertyType) -> SyncResult<DataType> {
    let mut candidates = property
        .types
        .0
        .iter()
        .filter(|typ| **typ != PropType::Null);

    let (Some(typ), None) = (candidates.next(), candidates.next()) else {
        return Ok(DataType::String);
    };

    let data_type = match typ {
        PropType::String => convert_string(property),
        PropType::Boolean => DataType::Boolean,
        PropType::Number => DataType::Double,
        PropType::Integer => DataType::Int64,
        PropType::Object | PropType::Array => DataType::Json,
        PropType::Null | PropType::Other(_) => {
            bail!(
                ErrorKind::UnsupportedType,
                "Property type is not supported",
                format!(
                    "{}:{}:{}",
                    typ,
                    property.format.as_deref().unwrap_or_default(),
                    property.airbyte_type.as_deref().unwrap_or_default()
                )
            );
        }
    };

    Ok(data_type)
}

fn convert_string(property: &PropertyType) -> DataType {
    match property.format.as_deref() {
        Some(DATE_FORMAT) => DataType::Date,
        Some(DATE_TIME_FORMAT)
            if property.airbyte_type.as_deref() == Some(TIMESTAMP_WITHOUT_TIMEZONE) =>
        {
            DataType::String
        }
        Some(DATE_TIME_FORMAT) => DataType::Timestamp,
        _ => DataType::String,
    }
}
