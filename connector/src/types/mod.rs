//! Common types used throughout the connector.
//!
//! Includes the Propel resource model (Data Sources, Data Pools, deletion jobs), column types and
//! the records flowing through the batching pipeline.

mod column;
mod record;
mod sized;
mod table;

pub use column::*;
pub use record::*;
pub use sized::*;
pub use table::*;
