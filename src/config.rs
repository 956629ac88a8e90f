//! Configuration loading via `ortho-config`.
//!
//! Every configuration struct in the crate is discovered from `snowlift.toml`
//! (or `.snowlift.toml`, or the file named by `SNOWLIFT_CONFIG_PATH`) and
//! layered with environment variables under its own prefix.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Program name passed to `ortho-config` when loading without CLI arguments.
pub(crate) const APP_NAME: &str = "snowlift";

/// Client connection settings shared by every command.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SNOWFLAKE",
    discovery(
        app_name = "snowlift",
        env_var = "SNOWLIFT_CONFIG_PATH",
        config_file_name = "snowlift.toml",
        dotfile_name = ".snowlift.toml",
        project_file_name = "snowlift.toml"
    )
)]
pub struct SnowflakeConfig {
    /// Connection profile to use from the client's `config.toml`.
    #[ortho_config(default = "default".to_owned())]
    pub connection_name: String,
    /// Directory holding `config.toml` and `connections.toml`. Falls back to
    /// `~/.snowflake` when unset.
    pub home: Option<String>,
    /// Path to the `snow` executable.
    #[ortho_config(default = "snow".to_owned())]
    pub snow_bin: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
pub(crate) struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    pub(crate) const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

/// Rejects empty or whitespace-only values with guidance on where to set them.
pub(crate) fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to snowlift.toml",
            metadata.description, metadata.env_var, metadata.toml_key
        )));
    }
    Ok(())
}

/// Splits a comma separated setting into trimmed, non-empty entries.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

impl SnowflakeConfig {
    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Replaces the connection name when an override is supplied.
    #[must_use]
    pub fn with_connection(mut self, connection: Option<&str>) -> Self {
        if let Some(name) = connection.map(str::trim).filter(|name| !name.is_empty()) {
            name.clone_into(&mut self.connection_name);
        }
        self
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.connection_name,
            &FieldMetadata::new(
                "connection name",
                "SNOWFLAKE_CONNECTION_NAME",
                "connection_name",
            ),
        )?;
        require_field(
            &self.snow_bin,
            &FieldMetadata::new("snow executable", "SNOWFLAKE_SNOW_BIN", "snow_bin"),
        )?;
        if let Some(home) = &self.home {
            require_field(
                home,
                &FieldMetadata::new("client home directory", "SNOWFLAKE_HOME", "home"),
            )?;
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds a value outside its accepted range.
    #[error("invalid configuration field {field}: {reason}")]
    InvalidField {
        /// Offending field name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
