//! Platform abstraction consumed by the provisioner, job submitter, job
//! tracker, and remote session launcher.
//!
//! The traits describe the handful of calls the crate needs from the managed
//! ML platform. [`crate::Connection`] implements them by driving the `snow`
//! client; tests substitute scripted doubles.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::jobs::{JobStatus, JobSubmission};
use crate::provision::Statement;
use crate::remote::TunnelRequest;

/// Future returned by platform operations.
pub type PlatformFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Identifier of a submitted job; doubles as the service name that status
/// queries are issued against.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps a platform job identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A directory inside a platform stage (`@STAGE/path`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StageLocation {
    /// Stage name, optionally qualified as `DB.SCHEMA.STAGE`.
    pub stage: String,
    /// Path below the stage root, without leading or trailing slashes.
    pub path: String,
}

impl StageLocation {
    /// Builds a location, trimming surrounding slashes from `path`.
    #[must_use]
    pub fn new(stage: impl Into<String>, path: impl Into<String>) -> Self {
        let raw_path: String = path.into();
        Self {
            stage: stage.into().trim().trim_start_matches('@').to_owned(),
            path: raw_path.trim_matches('/').to_owned(),
        }
    }

    /// Renders the location as a stage URI understood by the platform.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.path.is_empty() {
            format!("@{}", self.stage)
        } else {
            format!("@{}/{}", self.stage, self.path)
        }
    }

    /// Returns the `DB.SCHEMA` prefix when the stage name is qualified.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.stage.rsplit_once('.').map(|(namespace, _)| namespace)
    }
}

impl fmt::Display for StageLocation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.uri())
    }
}

/// One status observation for a job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatusReport {
    /// Normalised status.
    pub status: JobStatus,
    /// Status string exactly as reported by the platform.
    pub raw: String,
    /// Platform-provided detail, typically populated on failure.
    pub message: Option<String>,
}

impl StatusReport {
    /// Builds a report whose raw text mirrors the normalised status.
    #[must_use]
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            raw: status.as_str().to_ascii_uppercase(),
            message: None,
        }
    }

    /// Attaches a platform message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Row returned when listing recent jobs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobSummary {
    /// Job identifier.
    pub id: JobId,
    /// Platform status string.
    pub status: String,
    /// Compute pool running the job.
    pub compute_pool: String,
}

/// Lifecycle state of a long-running container service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceState {
    /// Service is being created or scheduled.
    Starting,
    /// Service is up.
    Running,
    /// Service is suspended and needs a resume request.
    Suspended,
    /// Any other state, kept verbatim.
    Other(String),
}

impl ServiceState {
    /// Maps a platform status string onto a [`ServiceState`].
    #[must_use]
    pub fn from_platform(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "STARTING" | "RESUMING" => Self::Starting,
            "RUNNING" | "READY" => Self::Running,
            "SUSPENDED" | "SUSPENDING" => Self::Suspended,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Row returned when listing container services.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceSummary {
    /// Service name.
    pub name: String,
    /// Platform status string.
    pub status: String,
    /// Compute pool hosting the service.
    pub compute_pool: String,
}

/// Statement execution against the platform.
pub trait Platform: Send + Sync {
    /// Platform specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes `statements` in order within one platform session, stopping
    /// at the first failure.
    fn execute_batch<'a>(
        &'a self,
        statements: &'a [Statement],
    ) -> PlatformFuture<'a, (), Self::Error>;
}

/// Job execution service operations.
pub trait JobPlatform: Platform {
    /// Uploads a file or directory tree to `destination`, creating the stage
    /// when it does not exist yet.
    fn upload<'a>(
        &'a self,
        source: &'a Utf8Path,
        destination: &'a StageLocation,
    ) -> PlatformFuture<'a, (), Self::Error>;

    /// Submits a job and returns once the platform has accepted it.
    fn submit_job<'a>(
        &'a self,
        submission: &'a JobSubmission,
    ) -> PlatformFuture<'a, JobId, Self::Error>;

    /// Queries the current status of a job.
    fn job_status<'a>(&'a self, job: &'a JobId) -> PlatformFuture<'a, StatusReport, Self::Error>;

    /// Reads what a finished job printed, or `None` when it printed nothing.
    fn job_output<'a>(
        &'a self,
        job: &'a JobId,
    ) -> PlatformFuture<'a, Option<String>, Self::Error>;

    /// Requests cancellation of a job.
    fn cancel_job<'a>(&'a self, job: &'a JobId) -> PlatformFuture<'a, (), Self::Error>;

    /// Lists up to `limit` recent jobs.
    fn list_jobs(&self, limit: usize) -> PlatformFuture<'_, Vec<JobSummary>, Self::Error>;
}

/// Long-running container service operations used for remote development.
pub trait ServicePlatform: Platform {
    /// Returns the service state, or `None` when the service does not exist.
    fn service_state<'a>(
        &'a self,
        service: &'a str,
    ) -> PlatformFuture<'a, Option<ServiceState>, Self::Error>;

    /// Requests that a suspended service resume.
    fn resume_service<'a>(&'a self, service: &'a str) -> PlatformFuture<'a, (), Self::Error>;

    /// Suspends a service.
    fn suspend_service<'a>(&'a self, service: &'a str) -> PlatformFuture<'a, (), Self::Error>;

    /// Lists container services visible to the connection.
    fn list_services(&self) -> PlatformFuture<'_, Vec<ServiceSummary>, Self::Error>;

    /// Starts the tunnel-and-editor process for `request` without waiting
    /// for it to exit.
    fn open_editor_tunnel<'a>(
        &'a self,
        request: &'a TunnelRequest,
    ) -> PlatformFuture<'a, (), Self::Error>;
}

impl<T: Platform + ?Sized> Platform for Arc<T> {
    type Error = T::Error;

    fn execute_batch<'a>(
        &'a self,
        statements: &'a [Statement],
    ) -> PlatformFuture<'a, (), Self::Error> {
        (**self).execute_batch(statements)
    }
}

impl<T: JobPlatform + ?Sized> JobPlatform for Arc<T> {
    fn upload<'a>(
        &'a self,
        source: &'a Utf8Path,
        destination: &'a StageLocation,
    ) -> PlatformFuture<'a, (), Self::Error> {
        (**self).upload(source, destination)
    }

    fn submit_job<'a>(
        &'a self,
        submission: &'a JobSubmission,
    ) -> PlatformFuture<'a, JobId, Self::Error> {
        (**self).submit_job(submission)
    }

    fn job_status<'a>(&'a self, job: &'a JobId) -> PlatformFuture<'a, StatusReport, Self::Error> {
        (**self).job_status(job)
    }

    fn job_output<'a>(
        &'a self,
        job: &'a JobId,
    ) -> PlatformFuture<'a, Option<String>, Self::Error> {
        (**self).job_output(job)
    }

    fn cancel_job<'a>(&'a self, job: &'a JobId) -> PlatformFuture<'a, (), Self::Error> {
        (**self).cancel_job(job)
    }

    fn list_jobs(&self, limit: usize) -> PlatformFuture<'_, Vec<JobSummary>, Self::Error> {
        (**self).list_jobs(limit)
    }
}

impl<T: ServicePlatform + ?Sized> ServicePlatform for Arc<T> {
    fn service_state<'a>(
        &'a self,
        service: &'a str,
    ) -> PlatformFuture<'a, Option<ServiceState>, Self::Error> {
        (**self).service_state(service)
    }

    fn resume_service<'a>(&'a self, service: &'a str) -> PlatformFuture<'a, (), Self::Error> {
        (**self).resume_service(service)
    }

    fn suspend_service<'a>(&'a self, service: &'a str) -> PlatformFuture<'a, (), Self::Error> {
        (**self).suspend_service(service)
    }

    fn list_services(&self) -> PlatformFuture<'_, Vec<ServiceSummary>, Self::Error> {
        (**self).list_services()
    }

    fn open_editor_tunnel<'a>(
        &'a self,
        request: &'a TunnelRequest,
    ) -> PlatformFuture<'a, (), Self::Error> {
        (**self).open_editor_tunnel(request)
    }
}
