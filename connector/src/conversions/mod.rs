//! Conversions from the source-declared schema to Propel column types.

pub mod types;
