//! Clients for the services a sync talks to.
//!
//! The engine only depends on the traits in this module. [`propel`] implements them over HTTP;
//! test doubles live in `crate::test_utils`.

mod base;
pub mod propel;

pub use base::*;
