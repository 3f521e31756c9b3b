//! Configuration of the Propel destination connector.
//!
//! The platform hands the connector a JSON configuration file. [`load_config_from_path`] reads it
//! and layers `APP_`-prefixed environment variable overrides on top, which is how operators tune
//! batching and polling without touching the platform-managed file.

mod load;
pub mod shared;

pub use load::{LoadConfigError, load_config_from_path};
