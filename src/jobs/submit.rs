//! Job submission: validate, stage, upload, launch.

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::platform::{JobId, JobPlatform, StageLocation};

use super::error::JobError;
use super::manifest::JobSubmission;
use super::request::JobRequest;
use super::staging::stage_payload;
use super::status::JobResult;

/// Reference to a submitted job.
///
/// Clones share one result cell, so a terminal result observed through any
/// clone is visible to all of them.
#[derive(Clone, Debug)]
pub struct JobHandle {
    id: JobId,
    location: Option<StageLocation>,
    result: Arc<OnceLock<JobResult>>,
}

impl JobHandle {
    /// Refers to a job submitted earlier, for example from another process.
    #[must_use]
    pub fn attach(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            location: None,
            result: Arc::new(OnceLock::new()),
        }
    }

    fn submitted(id: JobId, location: StageLocation) -> Self {
        Self {
            id,
            location: Some(location),
            result: Arc::new(OnceLock::new()),
        }
    }

    /// Identifier the job's status is queried under.
    #[must_use]
    pub const fn id(&self) -> &JobId {
        &self.id
    }

    /// Stage directory holding the payload, when this handle submitted it.
    #[must_use]
    pub const fn location(&self) -> Option<&StageLocation> {
        self.location.as_ref()
    }

    /// Terminal result, once one has been observed.
    #[must_use]
    pub fn result(&self) -> Option<&JobResult> {
        self.result.get()
    }

    /// Stores a terminal result and returns whichever result won the cell.
    pub(crate) fn settle(&self, result: JobResult) -> JobResult {
        self.result.get_or_init(|| result).clone()
    }
}

/// Submits jobs to a [`JobPlatform`].
#[derive(Clone, Debug)]
pub struct JobSubmitter<P> {
    platform: P,
    runtime_image: String,
}

impl<P: JobPlatform> JobSubmitter<P> {
    /// Creates a submitter that launches jobs in `runtime_image`.
    #[must_use]
    pub fn new(platform: P, runtime_image: impl Into<String>) -> Self {
        Self {
            platform,
            runtime_image: runtime_image.into(),
        }
    }

    /// Validates `request`, uploads its payload to a fresh stage directory,
    /// and launches the job. Returns as soon as the platform accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Validation`] or [`JobError::InvalidPayload`]
    /// before any remote call, [`JobError::Staging`] when the local copy
    /// fails, and [`JobError::Platform`] when the upload or launch fails.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobError<P::Error>> {
        request.validate()?;
        let excludes = request.excludes()?;
        let submission = JobSubmission::new(request, &self.runtime_image);
        let staged = stage_payload(&request.payload, &excludes)?;

        self.platform
            .upload(staged.path(), submission.location())
            .await
            .map_err(JobError::Platform)?;
        let id = self
            .platform
            .submit_job(&submission)
            .await
            .map_err(JobError::Platform)?;

        info!(
            job = %id,
            pool = submission.compute_pool(),
            files = staged.file_count(),
            location = %submission.location(),
            "submitted job"
        );
        Ok(JobHandle::submitted(id, submission.location().clone()))
    }
}
