//! [`Connection`]: the platform implementation backed by the `snow` client.
//!
//! Each call spawns one `snow` process, so a connection carries no mutable
//! session state and may be shared across tasks.

use std::env;
use std::ffi::OsString;

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::command::{CommandError, CommandRunner, ProcessCommandRunner};
use crate::jobs::{CONTAINER_NAME, JobStatus, JobSubmission};
use crate::platform::{
    JobId, JobPlatform, JobSummary, Platform, PlatformFuture, ServicePlatform, ServiceState,
    ServiceSummary, StageLocation, StatusReport,
};
use crate::provision::{CreateMode, ObjectKind, Statement};
use crate::remote::TunnelRequest;

use super::profile::ConnectionProfile;

/// Errors raised while driving the `snow` client.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PlatformError {
    /// Raised when the client binary cannot be started.
    #[error(transparent)]
    Spawn(#[from] CommandError),
    /// Raised when the client exits unsuccessfully; stderr is preserved.
    #[error("{action} failed with status {status}: {stderr}")]
    CommandFailure {
        /// Operation that was attempted.
        action: String,
        /// Exit status text.
        status: String,
        /// Diagnostic output from the client.
        stderr: String,
    },
    /// Raised when the client output cannot be interpreted.
    #[error("unexpected output from {action}: {message}")]
    Parse {
        /// Operation that was attempted.
        action: String,
        /// Parser error detail.
        message: String,
    },
}

/// An authenticated context for one named connection profile.
#[derive(Clone, Debug)]
pub struct Connection<R: CommandRunner = ProcessCommandRunner> {
    runner: R,
    snow_bin: String,
    profile: ConnectionProfile,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl<R: CommandRunner> Connection<R> {
    /// Builds a connection for a validated profile.
    #[must_use]
    pub fn new(runner: R, snow_bin: impl Into<String>, profile: ConnectionProfile) -> Self {
        Self {
            runner,
            snow_bin: snow_bin.into(),
            profile,
        }
    }

    /// Profile this connection authenticates with.
    #[must_use]
    pub const fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Name of the profile this connection authenticates with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Asks the client to authenticate, confirming the profile works.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the client rejects the connection.
    pub fn verify(&self) -> Result<(), PlatformError> {
        self.invoke("connection test", &["connection", "test"], Vec::new())
            .map(|_| ())
    }

    /// Runs SQL text and returns the parsed JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the client fails or prints non-JSON
    /// output.
    pub fn query(&self, sql: &str) -> Result<Value, PlatformError> {
        debug!(connection = %self.profile.name, sql, "running query");
        let stdout = self.invoke(
            "sql",
            &["sql", "--format", "json"],
            vec![OsString::from("--query"), OsString::from(sql)],
        )?;
        if stdout.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        serde_json::from_str(&stdout).map_err(|err| PlatformError::Parse {
            action: String::from("sql"),
            message: err.to_string(),
        })
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, PlatformError> {
        self.query(sql).map(rows)
    }

    fn invoke(
        &self,
        action: &str,
        subcommand: &[&str],
        extra: Vec<OsString>,
    ) -> Result<String, PlatformError> {
        let mut args: Vec<OsString> = subcommand.iter().map(OsString::from).collect();
        args.extend(extra);
        args.push(OsString::from("--connection"));
        args.push(OsString::from(&self.profile.name));

        let output = self.runner.run(&self.snow_bin, &args)?;
        if output.is_success() {
            return Ok(output.stdout);
        }
        let stderr = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_owned()
        } else {
            output.stderr.trim().to_owned()
        };
        Err(PlatformError::CommandFailure {
            action: action.to_owned(),
            status: output.status_text(),
            stderr,
        })
    }

    fn status_of(&self, job: &JobId) -> Result<StatusReport, PlatformError> {
        let sql = format!(
            "SELECT SYSTEM$GET_SERVICE_STATUS({}) AS STATUS",
            quote_literal(job.as_str())
        );
        let rows = self.query_rows(&sql)?;
        let payload = rows
            .first()
            .and_then(|row| field(row, "STATUS"))
            .ok_or_else(|| PlatformError::Parse {
                action: String::from("job status"),
                message: format!("no status returned for {job}"),
            })?;
        let containers: Vec<ContainerStatus> =
            serde_json::from_str(payload).map_err(|err| PlatformError::Parse {
                action: String::from("job status"),
                message: err.to_string(),
            })?;

        let status = JobStatus::aggregate(
            containers
                .iter()
                .map(|container| JobStatus::from_platform(&container.status)),
        );
        let raw = containers
            .iter()
            .map(|container| container.status.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let message = containers
            .iter()
            .filter(|container| JobStatus::from_platform(&container.status) == status)
            .find_map(|container| {
                container
                    .message
                    .as_deref()
                    .map(str::trim)
                    .filter(|message| !message.is_empty())
                    .map(str::to_owned)
            });
        debug!(job = %job, status = status.as_str(), raw = %raw, "polled job status");
        Ok(StatusReport {
            status,
            raw,
            message,
        })
    }

    fn output_of(&self, job: &JobId) -> Result<Option<String>, PlatformError> {
        let sql = format!(
            "SELECT SYSTEM$GET_SERVICE_LOGS({}, 0, {}) AS LOGS",
            quote_literal(job.as_str()),
            quote_literal(CONTAINER_NAME)
        );
        let rows = self.query_rows(&sql)?;
        Ok(rows
            .first()
            .and_then(|row| field(row, "LOGS"))
            .map(str::trim)
            .filter(|logs| !logs.is_empty())
            .map(str::to_owned))
    }

    fn upload_blocking(
        &self,
        source: &Utf8Path,
        destination: &StageLocation,
    ) -> Result<(), PlatformError> {
        let create = Statement::Create {
            kind: ObjectKind::Stage,
            name: destination.stage.clone(),
            mode: CreateMode::IfNotExists,
            properties: Vec::new(),
        };
        self.query(&create.to_string())?;

        let mut extra = vec![
            OsString::from(source.as_str()),
            OsString::from(format!("{}/", destination.uri())),
            OsString::from("--overwrite"),
        ];
        if source.is_dir() {
            extra.push(OsString::from("--recursive"));
        }
        self.invoke("stage copy", &["stage", "copy"], extra)?;
        info!(source = %source, destination = %destination, "uploaded payload");
        Ok(())
    }

    fn tunnel_blocking(&self, request: &TunnelRequest) -> Result<(), PlatformError> {
        let args: Vec<OsString> = [
            "remote",
            request.editor.as_str(),
            request.service.as_str(),
            "--compute-pool",
            request.compute_pool.as_str(),
            "--eai-name",
            request.integration.as_str(),
            "--stage",
            request.stage.as_str(),
            "--connection",
            self.profile.name.as_str(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        let mut extra_env = Vec::new();
        if let Some(dir) = &request.editor_dir {
            let mut path = OsString::from(dir.as_str());
            if let Some(existing) = env::var_os("PATH") {
                path.push(":");
                path.push(existing);
            }
            extra_env.push((String::from("PATH"), path));
        }

        self.runner
            .spawn_detached(&self.snow_bin, &args, &extra_env)?;
        info!(
            service = %request.service,
            editor = request.editor.as_str(),
            "remote session launched"
        );
        Ok(())
    }
}

impl<R: CommandRunner> Platform for Connection<R> {
    type Error = PlatformError;

    fn execute_batch<'a>(
        &'a self,
        statements: &'a [Statement],
    ) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            if statements.is_empty() {
                return Ok(());
            }
            let script = statements
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";\n");
            self.query(&format!("{script};")).map(|_| ())
        })
    }
}

impl<R: CommandRunner> JobPlatform for Connection<R> {
    fn upload<'a>(
        &'a self,
        source: &'a Utf8Path,
        destination: &'a StageLocation,
    ) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move { self.upload_blocking(source, destination) })
    }

    fn submit_job<'a>(
        &'a self,
        submission: &'a JobSubmission,
    ) -> PlatformFuture<'a, JobId, Self::Error> {
        Box::pin(async move {
            self.query(&submission.sql())?;
            Ok(submission.job_id().clone())
        })
    }

    fn job_status<'a>(&'a self, job: &'a JobId) -> PlatformFuture<'a, StatusReport, Self::Error> {
        Box::pin(async move { self.status_of(job) })
    }

    fn job_output<'a>(
        &'a self,
        job: &'a JobId,
    ) -> PlatformFuture<'a, Option<String>, Self::Error> {
        Box::pin(async move { self.output_of(job) })
    }

    fn cancel_job<'a>(&'a self, job: &'a JobId) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let drop = Statement::Drop {
                kind: ObjectKind::Service,
                name: job.to_string(),
            };
            self.query(&drop.to_string()).map(|_| ())
        })
    }

    fn list_jobs(&self, limit: usize) -> PlatformFuture<'_, Vec<JobSummary>, Self::Error> {
        Box::pin(async move {
            let rows = self.query_rows(&format!("SHOW JOB SERVICES LIMIT {limit}"))?;
            Ok(rows
                .iter()
                .take(limit)
                .map(|row| JobSummary {
                    id: JobId::new(field(row, "name").unwrap_or_default()),
                    status: field(row, "status").unwrap_or_default().to_owned(),
                    compute_pool: field(row, "compute_pool").unwrap_or_default().to_owned(),
                })
                .collect())
        })
    }
}

impl<R: CommandRunner> ServicePlatform for Connection<R> {
    fn service_state<'a>(
        &'a self,
        service: &'a str,
    ) -> PlatformFuture<'a, Option<ServiceState>, Self::Error> {
        Box::pin(async move {
            let rows =
                self.query_rows(&format!("SHOW SERVICES LIKE {}", quote_literal(service)))?;
            Ok(rows
                .iter()
                .find(|row| {
                    field(row, "name").is_some_and(|name| name.eq_ignore_ascii_case(service))
                })
                .and_then(|row| field(row, "status"))
                .map(ServiceState::from_platform))
        })
    }

    fn resume_service<'a>(&'a self, service: &'a str) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let statement = Statement::alter(ObjectKind::Service, service, "RESUME");
            self.query(&statement.to_string()).map(|_| ())
        })
    }

    fn suspend_service<'a>(&'a self, service: &'a str) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let statement = Statement::alter(ObjectKind::Service, service, "SUSPEND");
            self.query(&statement.to_string()).map(|_| ())
        })
    }

    fn list_services(&self) -> PlatformFuture<'_, Vec<ServiceSummary>, Self::Error> {
        Box::pin(async move {
            let rows = self.query_rows("SHOW SERVICES")?;
            Ok(rows
                .iter()
                .map(|row| ServiceSummary {
                    name: field(row, "name").unwrap_or_default().to_owned(),
                    status: field(row, "status").unwrap_or_default().to_owned(),
                    compute_pool: field(row, "compute_pool").unwrap_or_default().to_owned(),
                })
                .collect())
        })
    }

    fn open_editor_tunnel<'a>(
        &'a self,
        request: &'a TunnelRequest,
    ) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move { self.tunnel_blocking(request) })
    }
}

/// Flattens client JSON output into result rows. Multi-statement scripts
/// print one array per statement; the last statement's rows are returned.
fn rows(value: Value) -> Vec<Map<String, Value>> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    if items.iter().all(Value::is_array) {
        return items.into_iter().last().map_or_else(Vec::new, rows);
    }
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect()
}

fn field<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    row.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .and_then(|(_, value)| value.as_str())
}

/// Renders `value` as a single-quoted SQL string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
