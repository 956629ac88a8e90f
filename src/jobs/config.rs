//! Job submission defaults loaded via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::config::{APP_NAME, ConfigError, FieldMetadata, require_field, split_list};

/// Defaults applied to `submit-*`, `wait`, and `status` commands.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SNOWLIFT_JOBS",
    discovery(
        app_name = "snowlift",
        env_var = "SNOWLIFT_CONFIG_PATH",
        config_file_name = "snowlift.toml",
        dotfile_name = ".snowlift.toml",
        project_file_name = "snowlift.toml"
    )
)]
pub struct JobsConfig {
    /// Stage that receives job payloads.
    #[ortho_config(default = "ML_JOBS_STAGE".to_owned())]
    pub job_stage: String,
    /// Container image jobs run in.
    #[ortho_config(
        default = "/snowflake/images/snowflake_images/st_plat/runtime/x86/runtime_image/snowbooks:latest".to_owned()
    )]
    pub runtime_image: String,
    /// Comma separated external access integrations granted by default.
    #[ortho_config(default = "ALLOW_ALL_INTEGRATION".to_owned())]
    pub integrations: String,
    /// Default wait timeout in seconds.
    #[ortho_config(default = 3600)]
    pub timeout_secs: u64,
    /// First poll interval in seconds.
    #[ortho_config(default = 2)]
    pub poll_initial_secs: u64,
    /// Longest poll interval in seconds.
    #[ortho_config(default = 30)]
    pub poll_max_secs: u64,
    /// Consecutive failed polls tolerated before giving up.
    #[ortho_config(default = 3)]
    pub transient_retries: u32,
    /// Comma separated glob patterns left out of directory payloads.
    #[ortho_config(default = "__pycache__,*.pyc,.pytest_cache,.git".to_owned())]
    pub exclude_patterns: String,
}

impl JobsConfig {
    /// Loads job defaults without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks required fields and interval ordering.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for blank values and
    /// [`ConfigError::InvalidField`] for inconsistent poll intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.job_stage,
            &FieldMetadata::new("job stage", "SNOWLIFT_JOBS_JOB_STAGE", "job_stage"),
        )?;
        require_field(
            &self.runtime_image,
            &FieldMetadata::new(
                "runtime image",
                "SNOWLIFT_JOBS_RUNTIME_IMAGE",
                "runtime_image",
            ),
        )?;
        if self.poll_initial_secs == 0 {
            return Err(ConfigError::InvalidField {
                field: String::from("poll_initial_secs"),
                reason: String::from("must be at least 1"),
            });
        }
        if self.poll_max_secs < self.poll_initial_secs {
            return Err(ConfigError::InvalidField {
                field: String::from("poll_max_secs"),
                reason: format!(
                    "must not be below poll_initial_secs ({})",
                    self.poll_initial_secs
                ),
            });
        }
        Ok(())
    }

    /// Default integrations as a list.
    #[must_use]
    pub fn integration_list(&self) -> Vec<String> {
        split_list(&self.integrations)
    }

    /// Default exclude patterns as a list.
    #[must_use]
    pub fn exclude_list(&self) -> Vec<String> {
        split_list(&self.exclude_patterns)
    }

    /// Default wait timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
