//! Remote development sessions.
//!
//! [`SessionLauncher::connect`] finds the local editor, resumes the
//! development service if it is suspended, and starts `snow remote` in the
//! background so the editor attaches to the container. Disconnecting
//! suspends the service, leaving files on the stage intact.

mod config;
mod editor;

use thiserror::Error;
use tracing::info;

use camino::Utf8PathBuf;

use crate::platform::{ServicePlatform, ServiceState, ServiceSummary};

pub use config::RemoteConfig;
pub use editor::{EditorInstall, EditorKind, EditorLocator};

/// What to connect to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionTarget {
    /// Development service name.
    pub service: String,
    /// Compute pool hosting the service.
    pub compute_pool: String,
    /// Stage synchronised with the container.
    pub stage: String,
    /// External access integration granted to the service.
    pub integration: String,
    /// Editor to open.
    pub editor: EditorKind,
}

impl SessionTarget {
    fn validate(&self) -> Result<(), String> {
        let fields = [
            ("service", &self.service),
            ("compute pool", &self.compute_pool),
            ("stage", &self.stage),
            ("integration", &self.integration),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(format!("{label} must not be empty"));
            }
        }
        if !self
            .service
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(format!(
                "service name {:?} may only contain letters, digits and '_'",
                self.service
            ));
        }
        Ok(())
    }
}

/// Arguments for the background tunnel process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TunnelRequest {
    /// Editor to open.
    pub editor: EditorKind,
    /// Development service name.
    pub service: String,
    /// Compute pool hosting the service.
    pub compute_pool: String,
    /// External access integration.
    pub integration: String,
    /// Stage reference, `@`-prefixed.
    pub stage: String,
    /// Directory prepended to `PATH` so the tunnel can find the editor.
    pub editor_dir: Option<Utf8PathBuf>,
}

/// Outcome of [`SessionLauncher::connect`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchedSession {
    /// Development service name.
    pub service: String,
    /// Editor that was launched.
    pub editor: EditorInstall,
    /// Service state before connecting; `None` when it did not exist yet.
    pub prior_state: Option<ServiceState>,
    /// Whether a resume request was issued.
    pub resumed: bool,
}

/// Outcome of [`SessionLauncher::disconnect`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disconnected {
    /// A suspend request was issued.
    Suspended,
    /// The service was already suspended.
    AlreadySuspended,
    /// No such service exists.
    NotFound,
}

/// Errors surfaced by [`SessionLauncher`].
#[derive(Debug, Error)]
pub enum SessionError<E>
where
    E: std::error::Error + 'static,
{
    /// The target is incomplete or malformed.
    #[error("invalid session target: {0}")]
    Validation(String),
    /// The editor is not installed where it can be found.
    #[error("{editor} not found on PATH or in known install locations; {hint}")]
    EditorNotFound {
        /// Editor that was searched for.
        editor: EditorKind,
        /// How to make it discoverable.
        hint: &'static str,
    },
    /// The platform rejected or failed a request.
    #[error("platform request failed: {0}")]
    Platform(#[source] E),
}

/// Starts and stops remote development sessions.
#[derive(Clone, Debug)]
pub struct SessionLauncher<P> {
    platform: P,
    locator: EditorLocator,
}

impl<P: ServicePlatform> SessionLauncher<P> {
    /// Creates a launcher that finds editors with `locator`.
    #[must_use]
    pub const fn new(platform: P, locator: EditorLocator) -> Self {
        Self { platform, locator }
    }

    /// Resumes the service if needed and opens the editor against it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Validation`] for an incomplete target,
    /// [`SessionError::EditorNotFound`] before any remote call when the
    /// editor is missing, and [`SessionError::Platform`] when a platform
    /// request fails.
    pub async fn connect(
        &self,
        target: &SessionTarget,
    ) -> Result<LaunchedSession, SessionError<P::Error>> {
        target.validate().map_err(SessionError::Validation)?;
        let install =
            self.locator
                .locate(target.editor)
                .ok_or(SessionError::EditorNotFound {
                    editor: target.editor,
                    hint: target.editor.install_hint(),
                })?;

        let prior_state = self
            .platform
            .service_state(&target.service)
            .await
            .map_err(SessionError::Platform)?;
        let resumed = prior_state == Some(ServiceState::Suspended);
        if resumed {
            info!(service = %target.service, "resuming suspended service");
            self.platform
                .resume_service(&target.service)
                .await
                .map_err(SessionError::Platform)?;
        }

        let request = TunnelRequest {
            editor: target.editor,
            service: target.service.clone(),
            compute_pool: target.compute_pool.clone(),
            integration: target.integration.clone(),
            stage: stage_reference(&target.stage),
            editor_dir: install.path_prefix.clone(),
        };
        self.platform
            .open_editor_tunnel(&request)
            .await
            .map_err(SessionError::Platform)?;

        Ok(LaunchedSession {
            service: target.service.clone(),
            editor: install,
            prior_state,
            resumed,
        })
    }

    /// Suspends the service. A missing or already suspended service is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Platform`] when a platform request fails.
    pub async fn disconnect(&self, service: &str) -> Result<Disconnected, SessionError<P::Error>> {
        let state = self
            .platform
            .service_state(service)
            .await
            .map_err(SessionError::Platform)?;
        match state {
            None => Ok(Disconnected::NotFound),
            Some(ServiceState::Suspended) => Ok(Disconnected::AlreadySuspended),
            Some(_) => {
                self.platform
                    .suspend_service(service)
                    .await
                    .map_err(SessionError::Platform)?;
                info!(service, "suspended service");
                Ok(Disconnected::Suspended)
            }
        }
    }

    /// Lists services visible to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Platform`] when the listing fails.
    pub async fn list(&self) -> Result<Vec<ServiceSummary>, SessionError<P::Error>> {
        self.platform
            .list_services()
            .await
            .map_err(SessionError::Platform)
    }
}

fn stage_reference(stage: &str) -> String {
    let trimmed = stage.trim();
    if trimmed.starts_with('@') {
        trimmed.to_owned()
    } else {
        format!("@{trimmed}")
    }
}
