//! Waiting primitives used while Propel resources change state.

pub mod poll;
