//! Sync orchestration and batching engine of the Propel destination.
//!
//! The [`destination::Destination`] drives a sync: it authenticates against Propel, reconciles
//! every configured stream with its Data Source ([`tables`]), multiplexes the input message
//! stream into per-table batches ([`batching`]) and tears every table down when the sync turns
//! out to be a full reset. Long running server operations are awaited with
//! [`concurrency::poll::poll_until_state`].

pub mod batching;
pub mod clients;
pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
mod macros;
pub mod tables;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
