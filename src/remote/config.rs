//! Remote development settings loaded via `ortho-config`.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::config::{APP_NAME, ConfigError, FieldMetadata, require_field};
use crate::provision::ProvisionedInfra;

use super::{EditorKind, SessionTarget};

/// Defaults for `snowlift connect` and `snowlift disconnect`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SNOWLIFT_REMOTE",
    discovery(
        app_name = "snowlift",
        env_var = "SNOWLIFT_CONFIG_PATH",
        config_file_name = "snowlift.toml",
        dotfile_name = ".snowlift.toml",
        project_file_name = "snowlift.toml"
    )
)]
pub struct RemoteConfig {
    /// Name of the development service.
    #[ortho_config(default = "dev".to_owned())]
    pub service_name: String,
    /// Editor to open: `cursor` or `code`.
    #[ortho_config(default = "cursor".to_owned())]
    pub editor: String,
    /// Compute pool hosting the service; defaults to the provisioned pool.
    pub compute_pool: Option<String>,
    /// Stage synchronised with the service; defaults to the provisioned stage.
    pub stage: Option<String>,
    /// External access integration; defaults to the provisioned integration.
    pub integration: Option<String>,
}

impl RemoteConfig {
    /// Loads remote settings without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Resolves a session target, filling unset objects from `infra`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for a blank service name and
    /// [`ConfigError::InvalidField`] for an unsupported editor.
    pub fn to_target(&self, infra: &ProvisionedInfra) -> Result<SessionTarget, ConfigError> {
        require_field(
            &self.service_name,
            &FieldMetadata::new(
                "service name",
                "SNOWLIFT_REMOTE_SERVICE_NAME",
                "service_name",
            ),
        )?;
        let editor: EditorKind =
            self.editor
                .parse()
                .map_err(|reason| ConfigError::InvalidField {
                    field: String::from("editor"),
                    reason,
                })?;
        let pick = |value: Option<&str>, fallback: &str| {
            value
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .unwrap_or(fallback)
                .to_owned()
        };
        Ok(SessionTarget {
            service: self.service_name.trim().to_owned(),
            compute_pool: pick(self.compute_pool.as_deref(), &infra.compute_pool),
            stage: pick(self.stage.as_deref(), &infra.stage),
            integration: pick(self.integration.as_deref(), &infra.integration),
            editor,
        })
    }
}
