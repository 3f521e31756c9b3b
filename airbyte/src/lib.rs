//! Airbyte protocol model and message emission.
//!
//! Connectors talk to the Airbyte platform through newline-delimited JSON envelopes tagged by a
//! `type` discriminator. This crate holds the serde model for the subset of the protocol a
//! destination needs and a [`Logger`] abstraction used to emit messages on stdout.

pub mod logger;
pub mod protocol;

pub use logger::{Logger, MessageWriter};
pub use protocol::*;
