use std::io;
use std::path::{Path, PathBuf};

use rust_cli_config::FileFormat;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading the configuration file and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The configuration file does not exist.
    #[error("configuration file `{0}` does not exist")]
    MissingConfigurationFile(PathBuf),

    /// The configuration file path is not valid UTF-8.
    #[error("configuration file path `{0}` is not valid UTF-8")]
    InvalidPath(PathBuf),

    /// The configuration file existed but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// Environment variable overrides failed to merge into the configuration.
    #[error("failed to load configuration from environment variables: {0}")]
    EnvironmentVariables(#[source] rust_cli_config::ConfigError),

    /// The configuration was parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// Reading the configuration file failed.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] io::Error),
}

/// Loads a JSON configuration file and applies environment-variable overrides.
///
/// Overrides use the `APP_` prefix and double underscores for nesting, so
/// `APP_BATCH__MAX_BYTES=500000` replaces `batch.max_bytes`.
pub fn load_config_from_path<T>(path: &Path) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    if !path.is_file() {
        return Err(LoadConfigError::MissingConfigurationFile(
            path.to_path_buf(),
        ));
    }

    let name = path
        .to_str()
        .ok_or_else(|| LoadConfigError::InvalidPath(path.to_path_buf()))?;

    let file_source = rust_cli_config::File::new(name, FileFormat::Json).required(true);
    let builder = rust_cli_config::Config::builder().add_source(file_source);

    // Validate the file on its own first so that a broken file is not reported as an
    // environment variable problem.
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::EnvironmentVariables)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}
