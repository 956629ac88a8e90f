//! In-memory job platform used by the lifecycle scenarios.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use snowlift::jobs::JobSubmission;
use snowlift::platform::{JobSummary, PlatformFuture, StatusReport};
use snowlift::provision::Statement;
use snowlift::{JobId, JobPlatform, JobStatus, Platform, StageLocation};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted platform failure: {0}")]
pub struct ScriptedPlatformError(pub String);

#[derive(Debug, Default)]
struct PlatformState {
    statuses: VecDeque<Result<JobStatus, String>>,
    uploads: Vec<UploadRecord>,
    submissions: Vec<String>,
    polls: usize,
    cancellations: Vec<JobId>,
    output: Option<String>,
    output_reads: usize,
}

/// Files seen in one upload, relative to the staged root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadRecord {
    pub destination: StageLocation,
    pub files: Vec<Utf8PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct ScriptedJobPlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl ScriptedJobPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PlatformState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn push_status(&self, status: JobStatus) {
        self.with_state(|state| state.statuses.push_back(Ok(status)));
    }

    pub fn push_poll_failure(&self) {
        self.with_state(|state| {
            state
                .statuses
                .push_back(Err(String::from("connection reset by peer")));
        });
    }

    pub fn set_output(&self, output: &str) {
        self.with_state(|state| state.output = Some(output.to_owned()));
    }

    pub fn output_reads(&self) -> usize {
        self.with_state(|state| state.output_reads)
    }

    pub fn polls(&self) -> usize {
        self.with_state(|state| state.polls)
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.with_state(|state| state.uploads.clone())
    }

    pub fn submissions(&self) -> Vec<String> {
        self.with_state(|state| state.submissions.clone())
    }

    pub fn cancellations(&self) -> Vec<JobId> {
        self.with_state(|state| state.cancellations.clone())
    }
}

fn list_files(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut files: Vec<Utf8PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = Utf8PathBuf::from_path_buf(entry.into_path()).ok()?;
            path.strip_prefix(root).ok().map(Utf8Path::to_path_buf)
        })
        .collect();
    files.sort();
    files
}

impl Platform for ScriptedJobPlatform {
    type Error = ScriptedPlatformError;

    fn execute_batch<'a>(
        &'a self,
        _statements: &'a [Statement],
    ) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async { Ok(()) })
    }
}

impl JobPlatform for ScriptedJobPlatform {
    fn upload<'a>(
        &'a self,
        source: &'a Utf8Path,
        destination: &'a StageLocation,
    ) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let record = UploadRecord {
                destination: destination.clone(),
                files: list_files(source),
            };
            self.with_state(|state| state.uploads.push(record));
            Ok(())
        })
    }

    fn submit_job<'a>(
        &'a self,
        submission: &'a JobSubmission,
    ) -> PlatformFuture<'a, JobId, Self::Error> {
        Box::pin(async move {
            self.with_state(|state| state.submissions.push(submission.sql()));
            Ok(submission.job_id().clone())
        })
    }

    fn job_status<'a>(&'a self, _job: &'a JobId) -> PlatformFuture<'a, StatusReport, Self::Error> {
        Box::pin(async move {
            let next = self.with_state(|state| {
                state.polls += 1;
                state
                    .statuses
                    .pop_front()
                    .unwrap_or(Ok(JobStatus::Running))
            });
            next.map(StatusReport::new).map_err(ScriptedPlatformError)
        })
    }

    fn job_output<'a>(
        &'a self,
        _job: &'a JobId,
    ) -> PlatformFuture<'a, Option<String>, Self::Error> {
        Box::pin(async move {
            Ok(self.with_state(|state| {
                state.output_reads += 1;
                state.output.clone()
            }))
        })
    }

    fn cancel_job<'a>(&'a self, job: &'a JobId) -> PlatformFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.with_state(|state| state.cancellations.push(job.clone()));
            Ok(())
        })
    }

    fn list_jobs(&self, _limit: usize) -> PlatformFuture<'_, Vec<JobSummary>, Self::Error> {
        Box::pin(async { Ok(Vec::new()) })
    }
}
