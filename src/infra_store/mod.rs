//! Records which objects `snowlift setup` provisioned.
//!
//! The names are written to a `[provisioned]` table in the discovered
//! `snowlift.toml`, so submissions and remote sessions can default to them.
//! Teardown removes the table again. Other tables in the file are preserved.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::ConfigDiscovery;
use ortho_config::toml;
use thiserror::Error;

use crate::provision::ProvisionedInfra;

const APP_NAME: &str = "snowlift";
const CONFIG_ENV_VAR: &str = "SNOWLIFT_CONFIG_PATH";
const CONFIG_FILE_NAME: &str = "snowlift.toml";
const DOTFILE_NAME: &str = ".snowlift.toml";
const PROJECT_FILE_NAME: &str = "snowlift.toml";
const PROVISIONED_SECTION: &str = "provisioned";

/// Errors raised while reading or updating the provisioned-infra record.
#[derive(Debug, Error)]
pub enum InfraStoreError {
    /// Raised when no configuration candidates are available.
    #[error("no configuration file candidates were discovered")]
    NoCandidates,
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the file is not valid TOML.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the `[provisioned]` table has an unexpected shape.
    #[error("invalid provisioned record in {path}: {message}")]
    InvalidStructure {
        /// Path that had invalid content.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Persistence for [`ProvisionedInfra`], injectable for tests.
pub trait InfraRecord {
    /// Returns the recorded infrastructure, if any.
    ///
    /// # Errors
    ///
    /// Returns [`InfraStoreError`] when the file cannot be read or parsed.
    fn load(&self) -> Result<Option<ProvisionedInfra>, InfraStoreError>;

    /// Records `infra`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`InfraStoreError`] when reading or writing the file fails.
    fn save(&self, infra: &ProvisionedInfra) -> Result<Utf8PathBuf, InfraStoreError>;

    /// Removes the record. Returns `false` when there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns [`InfraStoreError`] when reading or writing the file fails.
    fn clear(&self) -> Result<bool, InfraStoreError>;
}

/// Stores the record in `snowlift.toml` using `OrthoConfig`'s discovery
/// search order.
#[derive(Clone, Debug)]
pub struct InfraStore {
    discovery: ConfigDiscovery,
}

impl InfraStore {
    /// Builds a store using the standard discovery settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            discovery: ConfigDiscovery::builder(APP_NAME)
                .env_var(CONFIG_ENV_VAR)
                .config_file_name(CONFIG_FILE_NAME)
                .dotfile_name(DOTFILE_NAME)
                .project_file_name(PROJECT_FILE_NAME)
                .build(),
        }
    }

    /// Builds a store using an explicit discovery configuration.
    #[must_use]
    pub const fn with_discovery(discovery: ConfigDiscovery) -> Self {
        Self { discovery }
    }

    fn resolve_target(&self) -> Result<StoreTarget, InfraStoreError> {
        let candidates = self.discovery.utf8_candidates();
        for candidate in &candidates {
            if path_exists(candidate)? {
                return Ok(StoreTarget {
                    path: candidate.clone(),
                    exists: true,
                });
            }
        }
        candidates
            .last()
            .cloned()
            .map(|path| StoreTarget {
                path,
                exists: false,
            })
            .ok_or(InfraStoreError::NoCandidates)
    }

    fn read_document(&self) -> Result<(StoreTarget, toml::Value), InfraStoreError> {
        let target = self.resolve_target()?;
        let contents = if target.exists {
            read_file(&target.path)?
        } else {
            String::new()
        };
        let value = parse_toml(&target.path, &contents)?;
        Ok((target, value))
    }
}

impl Default for InfraStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InfraRecord for InfraStore {
    fn load(&self) -> Result<Option<ProvisionedInfra>, InfraStoreError> {
        let (target, value) = self.read_document()?;
        read_record(&target.path, &value)
    }

    fn save(&self, infra: &ProvisionedInfra) -> Result<Utf8PathBuf, InfraStoreError> {
        let (target, mut value) = self.read_document()?;
        let record = toml::Value::try_from(infra).map_err(|err| InfraStoreError::Parse {
            path: target.path.clone(),
            message: err.to_string(),
        })?;
        root_table(&target.path, &mut value)?.insert(String::from(PROVISIONED_SECTION), record);
        write_file(&target.path, &value)?;
        Ok(target.path)
    }

    fn clear(&self) -> Result<bool, InfraStoreError> {
        let (target, mut value) = self.read_document()?;
        if !target.exists {
            return Ok(false);
        }
        let removed = root_table(&target.path, &mut value)?
            .remove(PROVISIONED_SECTION)
            .is_some();
        if removed {
            write_file(&target.path, &value)?;
        }
        Ok(removed)
    }
}

#[derive(Clone, Debug)]
struct StoreTarget {
    path: Utf8PathBuf,
    exists: bool,
}

fn split_path(path: &Utf8Path) -> Result<(&Utf8Path, &str), InfraStoreError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| InfraStoreError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("configuration file path is missing a filename"),
        })?;
    Ok((parent, file_name))
}

fn io_error(path: &Utf8Path, err: &io::Error) -> InfraStoreError {
    InfraStoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn path_exists(path: &Utf8Path) -> Result<bool, InfraStoreError> {
    let (parent, file_name) = split_path(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name).map_err(|err| io_error(path, &err)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_error(parent, &err)),
    }
}

fn read_file(path: &Utf8Path) -> Result<String, InfraStoreError> {
    let (parent, file_name) = split_path(path)?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(parent, &err))?;
    dir.read_to_string(file_name)
        .map_err(|err| io_error(path, &err))
}

fn parse_toml(path: &Utf8Path, contents: &str) -> Result<toml::Value, InfraStoreError> {
    if contents.trim().is_empty() {
        return Ok(toml::Value::Table(toml::value::Table::new()));
    }
    toml::from_str(contents).map_err(|err| InfraStoreError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn root_table<'a>(
    path: &Utf8Path,
    value: &'a mut toml::Value,
) -> Result<&'a mut toml::value::Table, InfraStoreError> {
    value
        .as_table_mut()
        .ok_or_else(|| InfraStoreError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("configuration root is not a table"),
        })
}

fn read_record(
    path: &Utf8Path,
    value: &toml::Value,
) -> Result<Option<ProvisionedInfra>, InfraStoreError> {
    let Some(section) = value.get(PROVISIONED_SECTION) else {
        return Ok(None);
    };
    section
        .clone()
        .try_into()
        .map(Some)
        .map_err(|err| InfraStoreError::InvalidStructure {
            path: path.to_path_buf(),
            message: format!("[{PROVISIONED_SECTION}]: {err}"),
        })
}

fn write_file(path: &Utf8Path, value: &toml::Value) -> Result<(), InfraStoreError> {
    let (parent, file_name) = split_path(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority())
        .map_err(|err| io_error(parent, &err))?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(parent, &err))?;
    let rendered = toml::to_string_pretty(value).map_err(|err| InfraStoreError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    dir.write(file_name, rendered)
        .map_err(|err| io_error(path, &err))
}

#[cfg(test)]
mod tests;
