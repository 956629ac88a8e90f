//! Infrastructure settings loaded via `ortho-config`.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::config::{APP_NAME, ConfigError, split_list};

use super::{ComputePoolSpec, InfraSpec};

/// Names and sizing of the objects `snowlift setup` provisions.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SNOWLIFT_INFRA",
    discovery(
        app_name = "snowlift",
        env_var = "SNOWLIFT_CONFIG_PATH",
        config_file_name = "snowlift.toml",
        dotfile_name = ".snowlift.toml",
        project_file_name = "snowlift.toml"
    )
)]
pub struct InfraConfig {
    /// Project name, used to derive the default pool name.
    #[ortho_config(default = "ml_accelerator".to_owned())]
    pub project_name: String,
    /// Database holding the stage and network rule.
    #[ortho_config(default = "ML_ACCELERATOR".to_owned())]
    pub database: String,
    /// Schema holding the stage and network rule.
    #[ortho_config(default = "PUBLIC".to_owned())]
    pub schema: String,
    /// Role that owns the provisioned objects.
    #[ortho_config(default = "ACCOUNTADMIN".to_owned())]
    pub admin_role: String,
    /// Compute pool name; defaults to `<PROJECT_NAME>_POOL`.
    pub pool_name: Option<String>,
    /// Instance family for pool nodes, for example `CPU_X64_M` or `GPU_NV_S`.
    #[ortho_config(default = "CPU_X64_M".to_owned())]
    pub instance_family: String,
    /// Minimum node count.
    #[ortho_config(default = 1)]
    pub min_nodes: u32,
    /// Maximum node count.
    #[ortho_config(default = 1)]
    pub max_nodes: u32,
    /// Stage for persistent files.
    #[ortho_config(default = "DEV_STAGE".to_owned())]
    pub stage_name: String,
    /// Server-side encryption type for the stage.
    #[ortho_config(default = "SNOWFLAKE_SSE".to_owned())]
    pub stage_encryption: String,
    /// External access integration name.
    #[ortho_config(default = "ALLOW_ALL_INTEGRATION".to_owned())]
    pub integration_name: String,
    /// Comma separated `host:port` egress destinations.
    #[ortho_config(default = "0.0.0.0:443,0.0.0.0:80".to_owned())]
    pub egress_hosts: String,
}

impl InfraConfig {
    /// Loads infrastructure configuration without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Compute pool name after applying the project-derived default.
    #[must_use]
    pub fn resolved_pool_name(&self) -> String {
        self.pool_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(
                || format!("{}_POOL", self.project_name.trim().to_ascii_uppercase()),
                str::to_owned,
            )
    }

    /// Builds and validates an [`InfraSpec`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first rejected value.
    pub fn to_spec(&self) -> Result<InfraSpec, ConfigError> {
        let spec = InfraSpec {
            database: self.database.trim().to_owned(),
            schema: self.schema.trim().to_owned(),
            admin_role: self.admin_role.trim().to_owned(),
            pool: ComputePoolSpec {
                name: self.resolved_pool_name(),
                instance_family: self.instance_family.trim().to_owned(),
                min_nodes: self.min_nodes,
                max_nodes: self.max_nodes,
            },
            stage_name: self.stage_name.trim().to_owned(),
            stage_encryption: self.stage_encryption.trim().to_owned(),
            integration_name: self.integration_name.trim().to_owned(),
            egress_hosts: split_list(&self.egress_hosts),
        };
        spec.validate().map_err(|err| ConfigError::InvalidField {
            field: err.field().to_owned(),
            reason: err.to_string(),
        })?;
        Ok(spec)
    }
}
