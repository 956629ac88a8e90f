//! Named connection cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::command::{CommandRunner, ProcessCommandRunner};
use crate::config::{ConfigError, SnowflakeConfig};

use super::profile::{ProfileError, ProfileStore};
use super::snow::Connection;

/// Errors raised when a connection cannot be established.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConnectError {
    /// Client settings failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The connection profile is missing or invalid.
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Hands out one shared [`Connection`] per profile name.
///
/// Profiles are validated on first use; later requests for the same name
/// return the cached connection until [`ConnectionProvider::invalidate`] is
/// called.
#[derive(Debug)]
pub struct ConnectionProvider<R: CommandRunner + Clone = ProcessCommandRunner> {
    config: SnowflakeConfig,
    runner: R,
    cache: Mutex<HashMap<String, Arc<Connection<R>>>>,
}

impl ConnectionProvider {
    /// Builds a provider that shells out to the real `snow` client.
    #[must_use]
    pub fn new(config: SnowflakeConfig) -> Self {
        Self::with_runner(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner + Clone> ConnectionProvider<R> {
    /// Builds a provider using a custom command runner.
    #[must_use]
    pub fn with_runner(config: SnowflakeConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Settings the provider was built with.
    #[must_use]
    pub const fn config(&self) -> &SnowflakeConfig {
        &self.config
    }

    /// Returns the connection for `name`, or for the configured default when
    /// `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when the settings are invalid or the profile
    /// cannot be loaded. No client process is started in that case.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<Connection<R>>, ConnectError> {
        self.config.validate()?;
        let resolved = name
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .unwrap_or(self.config.connection_name.as_str())
            .to_owned();

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = cache.get(&resolved) {
            return Ok(Arc::clone(existing));
        }

        let store = ProfileStore::discover(self.config.home.as_deref())?;
        let profile = store.load(&resolved)?;
        debug!(
            connection = %resolved,
            home = %store.home(),
            auth = profile.auth.label(),
            "loaded connection profile"
        );
        let connection = Arc::new(Connection::new(
            self.runner.clone(),
            self.config.snow_bin.clone(),
            profile,
        ));
        cache.insert(resolved, Arc::clone(&connection));
        Ok(connection)
    }

    /// Drops the cached connection for `name` so the next request reloads
    /// its profile.
    pub fn invalidate(&self, name: &str) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}
