//! Connection profile discovery and validation.
//!
//! Profiles live in the platform client's own files: `connections.toml`
//! (one top-level table per connection) takes precedence over the
//! `[connections.<name>]` tables of `config.toml`. A profile must name an
//! account, a user, and exactly one authentication method; anything else is
//! rejected before the client is ever invoked.

use std::env;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::toml;
use serde::Deserialize;
use thiserror::Error;

const CONNECTIONS_FILE: &str = "connections.toml";
const CONFIG_FILE: &str = "config.toml";
const CONNECTIONS_TABLE: &str = "connections";
const HOME_ENV: &str = "SNOWFLAKE_HOME";
const DEFAULT_HOME_DIR: &str = ".snowflake";

/// Authentication method declared by a profile.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthMethod {
    /// Username and password.
    Password,
    /// Key-pair (JWT) authentication, optionally naming the key file.
    KeyPair {
        /// Private key file referenced by the profile.
        key_file: Option<String>,
    },
    /// Browser-based single sign-on.
    BrowserSso,
}

impl AuthMethod {
    /// Short label used in diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::KeyPair { .. } => "key pair",
            Self::BrowserSso => "browser SSO",
        }
    }
}

/// A validated connection profile.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionProfile {
    /// Profile name.
    pub name: String,
    /// Account identifier.
    pub account: String,
    /// Login name.
    pub user: String,
    /// Default warehouse, if any.
    pub warehouse: Option<String>,
    /// Default database, if any.
    pub database: Option<String>,
    /// Default role, if any.
    pub role: Option<String>,
    /// The single configured authentication method.
    pub auth: AuthMethod,
}

/// Errors raised while locating or validating a connection profile.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProfileError {
    /// Raised when no client home directory can be determined.
    #[error("cannot locate the client home directory: set SNOWFLAKE_HOME or HOME")]
    NoHome,
    /// Raised when neither profile file defines the requested connection.
    #[error("connection '{name}' not found in {searched}")]
    NotFound {
        /// Requested profile name.
        name: String,
        /// Files that were searched.
        searched: String,
    },
    /// Raised when a profile file cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a profile file is not valid TOML or has the wrong shape.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File that could not be parsed.
        path: Utf8PathBuf,
        /// Parser error string.
        message: String,
    },
    /// Raised when a mandatory key is absent or blank.
    #[error("connection '{name}' is missing required field '{field}'")]
    MissingField {
        /// Profile name.
        name: String,
        /// Missing key.
        field: &'static str,
    },
    /// Raised when the profile declares no authentication method.
    #[error(
        "connection '{name}' has no authentication method: set password, private_key_file, or authenticator"
    )]
    MissingAuth {
        /// Profile name.
        name: String,
    },
    /// Raised when the profile declares more than one authentication method.
    #[error("connection '{name}' declares conflicting authentication methods: {methods}")]
    ConflictingAuth {
        /// Profile name.
        name: String,
        /// Comma separated method labels.
        methods: String,
    },
    /// Raised when the authenticator value is not recognised.
    #[error("connection '{name}' uses unsupported authenticator '{authenticator}'")]
    UnsupportedAuthenticator {
        /// Profile name.
        name: String,
        /// Authenticator value from the profile.
        authenticator: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    account: Option<String>,
    user: Option<String>,
    warehouse: Option<String>,
    database: Option<String>,
    role: Option<String>,
    password: Option<String>,
    private_key_file: Option<String>,
    private_key_path: Option<String>,
    authenticator: Option<String>,
}

impl RawProfile {
    fn into_profile(self, name: &str) -> Result<ConnectionProfile, ProfileError> {
        let auth = self.auth_method(name)?;
        let account = required(self.account, name, "account")?;
        let user = required(self.user, name, "user")?;
        Ok(ConnectionProfile {
            name: name.to_owned(),
            account,
            user,
            warehouse: optional(self.warehouse),
            database: optional(self.database),
            role: optional(self.role),
            auth,
        })
    }

    fn auth_method(&self, name: &str) -> Result<AuthMethod, ProfileError> {
        let authenticator = self
            .authenticator
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let key_file = optional(self.private_key_file.clone())
            .or_else(|| optional(self.private_key_path.clone()));

        let mut methods = Vec::new();
        if self.password.is_some() {
            methods.push(AuthMethod::Password);
        }

        let jwt = match authenticator {
            None => false,
            Some(value) if value.eq_ignore_ascii_case("snowflake_jwt") => true,
            Some(value) if value.eq_ignore_ascii_case("externalbrowser") => {
                methods.push(AuthMethod::BrowserSso);
                false
            }
            // The client's default authenticator is plain password auth.
            Some(value) if value.eq_ignore_ascii_case("snowflake") => false,
            Some(other) => {
                return Err(ProfileError::UnsupportedAuthenticator {
                    name: name.to_owned(),
                    authenticator: other.to_owned(),
                });
            }
        };
        if jwt || key_file.is_some() {
            methods.push(AuthMethod::KeyPair { key_file });
        }

        match methods.len() {
            0 => Err(ProfileError::MissingAuth {
                name: name.to_owned(),
            }),
            1 => Ok(methods.remove(0)),
            _ => Err(ProfileError::ConflictingAuth {
                name: name.to_owned(),
                methods: methods
                    .iter()
                    .map(AuthMethod::label)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
}

fn required(
    value: Option<String>,
    name: &str,
    field: &'static str,
) -> Result<String, ProfileError> {
    optional(value).ok_or_else(|| ProfileError::MissingField {
        name: name.to_owned(),
        field,
    })
}

/// Reads connection profiles from a client home directory.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    home: Utf8PathBuf,
}

impl ProfileStore {
    /// Uses `home` as the client home directory.
    #[must_use]
    pub fn new(home: impl Into<Utf8PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolves the home directory from an explicit setting, then
    /// `SNOWFLAKE_HOME`, then `~/.snowflake`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NoHome`] when none of those are available.
    pub fn discover(configured_home: Option<&str>) -> Result<Self, ProfileError> {
        let explicit = configured_home
            .map(str::trim)
            .filter(|home| !home.is_empty())
            .map(expand_tilde);
        let from_env = || {
            env::var(HOME_ENV)
                .ok()
                .filter(|home| !home.trim().is_empty())
        };
        let fallback = || {
            env::var("HOME")
                .ok()
                .filter(|home| !home.trim().is_empty())
                .map(|home| format!("{home}/{DEFAULT_HOME_DIR}"))
        };

        explicit
            .or_else(from_env)
            .or_else(fallback)
            .map(|home| Self::new(Utf8PathBuf::from(home)))
            .ok_or(ProfileError::NoHome)
    }

    /// Directory searched for profile files.
    #[must_use]
    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    /// Loads and validates the named profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] when the profile is missing, unreadable, or
    /// fails validation.
    pub fn load(&self, name: &str) -> Result<ConnectionProfile, ProfileError> {
        let connections_path = self.home.join(CONNECTIONS_FILE);
        if let Some(document) = read_document(&connections_path)?
            && let Some(raw) = lookup(&connections_path, &document, &[name])?
        {
            return raw.into_profile(name);
        }

        let config_path = self.home.join(CONFIG_FILE);
        if let Some(document) = read_document(&config_path)?
            && let Some(raw) = lookup(&config_path, &document, &[CONNECTIONS_TABLE, name])?
        {
            return raw.into_profile(name);
        }

        Err(ProfileError::NotFound {
            name: name.to_owned(),
            searched: format!("{connections_path}, {config_path}"),
        })
    }
}

fn lookup(
    path: &Utf8Path,
    document: &toml::Value,
    keys: &[&str],
) -> Result<Option<RawProfile>, ProfileError> {
    let mut current = document;
    for key in keys {
        match current.get(*key) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    current
        .clone()
        .try_into::<RawProfile>()
        .map(Some)
        .map_err(|err| ProfileError::Parse {
            path: path.to_path_buf(),
            message: format!("[{}]: {err}", keys.join(".")),
        })
}

fn read_document(path: &Utf8Path) -> Result<Option<toml::Value>, ProfileError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let Some(file_name) = path.file_name() else {
        return Ok(None);
    };

    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ProfileError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    let contents = match dir.read_to_string(file_name) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ProfileError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    toml::from_str(&contents)
        .map(Some)
        .map_err(|err| ProfileError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}
