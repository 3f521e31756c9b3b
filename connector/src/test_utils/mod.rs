//! Test doubles and builders for exercising the engine without Propel.
//!
//! Every double records the calls it receives. Failures are injected through explicit fault
//! settings passed at construction, so each test owns the faults it configures.

pub mod api;
pub mod catalog;
pub mod config;
pub mod data_source;
pub mod logger;
pub mod messages;
pub mod oauth;
pub mod webhook;
