//! Job requests and their eager validation.

use std::collections::BTreeSet;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

use super::error::RequestError;
use super::staging::ExcludePatterns;
use crate::provision::{SpecError, check_identifier, check_qualified_identifier};

/// Code to run on the platform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Payload {
    /// A single script.
    File {
        /// Local script path.
        path: Utf8PathBuf,
    },
    /// A directory tree with a designated entrypoint.
    Directory {
        /// Local directory root.
        root: Utf8PathBuf,
        /// Script to run, relative to `root`.
        entrypoint: Utf8PathBuf,
    },
}

impl Payload {
    /// Path of the script relative to the uploaded payload root.
    #[must_use]
    pub fn entrypoint(&self) -> &str {
        match self {
            Self::File { path } => path.file_name().unwrap_or(path.as_str()),
            Self::Directory { entrypoint, .. } => entrypoint.as_str(),
        }
    }

    /// Local path the payload is read from.
    #[must_use]
    pub fn source(&self) -> &Utf8Path {
        match self {
            Self::File { path } => path,
            Self::Directory { root, .. } => root,
        }
    }

    fn validate(&self, excludes: &ExcludePatterns) -> Result<(), RequestError> {
        match self {
            Self::File { path } => {
                if !path.is_file() {
                    return Err(invalid(path, "file does not exist or is not a regular file"));
                }
                Ok(())
            }
            Self::Directory { root, entrypoint } => {
                if !root.is_dir() {
                    return Err(invalid(root, "directory does not exist"));
                }
                if entrypoint.as_str().is_empty() {
                    return Err(invalid(root, "entrypoint must not be empty"));
                }
                if !entrypoint.is_relative() {
                    return Err(invalid(
                        entrypoint,
                        "entrypoint must be relative to the directory",
                    ));
                }
                if entrypoint
                    .components()
                    .any(|component| matches!(component, Utf8Component::ParentDir))
                {
                    return Err(invalid(entrypoint, "entrypoint must not leave the directory"));
                }
                if excludes.excludes_path(entrypoint) {
                    return Err(invalid(
                        entrypoint,
                        "entrypoint is filtered out by exclude patterns",
                    ));
                }
                check_entrypoint_on_disk(root, entrypoint)
            }
        }
    }
}

/// Staging never follows symlinks, so the entrypoint and every directory
/// leading to it must be real entries under `root`.
fn check_entrypoint_on_disk(root: &Utf8Path, entrypoint: &Utf8Path) -> Result<(), RequestError> {
    let not_found = || invalid(entrypoint, &format!("entrypoint not found in {root}"));
    let mut current = root.to_path_buf();
    for component in entrypoint.components() {
        current.push(component.as_str());
        let metadata = current.symlink_metadata().map_err(|_| not_found())?;
        if metadata.file_type().is_symlink() {
            return Err(invalid(
                entrypoint,
                &format!("{current} is a symlink and would not be uploaded"),
            ));
        }
    }
    if current.symlink_metadata().is_ok_and(|metadata| metadata.is_file()) {
        Ok(())
    } else {
        Err(not_found())
    }
}

fn spec_error(err: SpecError) -> RequestError {
    RequestError::Validation(err.to_string())
}

fn invalid(path: &Utf8Path, reason: &str) -> RequestError {
    RequestError::InvalidPayload {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    }
}

/// A fully described job submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobRequest {
    /// Code to run.
    pub payload: Payload,
    /// Compute pool name.
    pub compute_target: String,
    /// Packages installed before the entrypoint runs, in order.
    pub dependencies: Vec<String>,
    /// Arguments passed to the entrypoint, in order.
    pub invocation_args: Vec<String>,
    /// Number of instances to run on.
    pub parallelism: u32,
    /// External access integrations granted to the job.
    pub network_access: BTreeSet<String>,
    /// Stage that receives the payload.
    pub stage: String,
    /// Glob patterns dropped from directory payloads.
    pub exclude_patterns: Vec<String>,
}

impl JobRequest {
    /// Starts a builder for `payload`.
    #[must_use]
    pub fn builder(payload: Payload) -> JobRequestBuilder {
        JobRequestBuilder::new(payload)
    }

    /// Compiles the request's exclude patterns.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when a pattern is malformed.
    pub fn excludes(&self) -> Result<ExcludePatterns, RequestError> {
        ExcludePatterns::new(&self.exclude_patterns)
            .map_err(|err| RequestError::Validation(format!("exclude pattern: {err}")))
    }

    /// Checks every field and the payload on disk.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] for empty or out-of-range fields
    /// and [`RequestError::InvalidPayload`] for unusable payloads.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.compute_target.is_empty() {
            return Err(RequestError::Validation(String::from(
                "compute target must not be empty",
            )));
        }
        if self.parallelism == 0 {
            return Err(RequestError::Validation(String::from(
                "parallelism must be at least 1",
            )));
        }
        if self.stage.is_empty() {
            return Err(RequestError::Validation(String::from(
                "stage must not be empty",
            )));
        }
        check_identifier("compute target", &self.compute_target).map_err(spec_error)?;
        check_qualified_identifier("stage", &self.stage).map_err(spec_error)?;
        self.network_access
            .iter()
            .try_for_each(|name| check_identifier("network access integration", name))
            .map_err(spec_error)?;
        if self.dependencies.iter().any(String::is_empty) {
            return Err(RequestError::Validation(String::from(
                "dependencies must not contain empty entries",
            )));
        }
        if self
            .dependencies
            .iter()
            .chain(&self.invocation_args)
            .any(|value| value.contains("$$"))
        {
            return Err(RequestError::Validation(String::from(
                "dependencies and arguments must not contain `$$`",
            )));
        }
        let excludes = self.excludes()?;
        self.payload.validate(&excludes)
    }
}

/// Builder for [`JobRequest`] that trims inputs and validates on build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobRequestBuilder {
    payload: Payload,
    compute_target: String,
    dependencies: Vec<String>,
    invocation_args: Vec<String>,
    parallelism: u32,
    network_access: BTreeSet<String>,
    stage: String,
    exclude_patterns: Vec<String>,
}

impl JobRequestBuilder {
    /// Creates a builder with a parallelism of one and no extras.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            compute_target: String::new(),
            dependencies: Vec::new(),
            invocation_args: Vec::new(),
            parallelism: 1,
            network_access: BTreeSet::new(),
            stage: String::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Sets the compute pool.
    #[must_use]
    pub fn compute_target(mut self, value: impl Into<String>) -> Self {
        self.compute_target = value.into();
        self
    }

    /// Appends package requirements.
    #[must_use]
    pub fn dependencies<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(values.into_iter().map(Into::into));
        self
    }

    /// Appends entrypoint arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invocation_args
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets the instance count.
    #[must_use]
    pub const fn parallelism(mut self, value: u32) -> Self {
        self.parallelism = value;
        self
    }

    /// Adds external access integrations.
    #[must_use]
    pub fn network_access<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.network_access
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets the stage that receives the payload.
    #[must_use]
    pub fn stage(mut self, value: impl Into<String>) -> Self {
        self.stage = value.into();
        self
    }

    /// Appends directory exclude patterns.
    #[must_use]
    pub fn exclude_patterns<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Builds and validates the request. Integration names are upper-cased
    /// so duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when validation fails.
    pub fn build(self) -> Result<JobRequest, RequestError> {
        let trim_all = |values: Vec<String>| -> Vec<String> {
            values
                .into_iter()
                .map(|value| value.trim().to_owned())
                .collect()
        };
        let request = JobRequest {
            payload: self.payload,
            compute_target: self.compute_target.trim().to_owned(),
            dependencies: trim_all(self.dependencies),
            invocation_args: self.invocation_args,
            parallelism: self.parallelism,
            network_access: self
                .network_access
                .into_iter()
                .map(|value| value.trim().to_ascii_uppercase())
                .collect(),
            stage: self.stage.trim().trim_start_matches('@').to_owned(),
            exclude_patterns: trim_all(self.exclude_patterns),
        };
        request.validate()?;
        Ok(request)
    }
}
