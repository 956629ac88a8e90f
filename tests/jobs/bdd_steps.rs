//! BDD step definitions for the job lifecycle.

use std::collections::BTreeSet;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, then, when};
use snowlift::test_support::ManualClock;
use snowlift::{
    JobError, JobRequest, JobStatus, JobSubmitter, JobTracker, Payload, PollPolicy,
};
use tokio::runtime::Runtime;

use super::test_doubles::{ScriptedJobPlatform, ScriptedPlatformError};
use super::test_helpers::{JobContext, JobOutcome};

const RUNTIME_IMAGE: &str = "/images/runtime:latest";

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn parse_status(raw: &str) -> Result<JobStatus, StepError> {
    match raw.trim() {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "succeeded" => Ok(JobStatus::Succeeded),
        "failed" => Ok(JobStatus::Failed),
        "cancelled" => Ok(JobStatus::Cancelled),
        other => Err(StepError::Assertion(format!("unknown status: {other}"))),
    }
}

fn error_kind(err: &JobError<ScriptedPlatformError>) -> &'static str {
    match err {
        JobError::Validation(_) => "validation",
        JobError::InvalidPayload { .. } => "invalid payload",
        JobError::Staging(_) => "staging",
        JobError::Platform(_) => "platform",
    }
}

fn rejected(err: &JobError<ScriptedPlatformError>) -> JobOutcome {
    JobOutcome::Rejected {
        kind: error_kind(err).to_owned(),
        message: err.to_string(),
    }
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

#[given("a project with entrypoint \"{entrypoint}\"")]
fn project_with_entrypoint(mut job_context: JobContext, entrypoint: String) -> JobContext {
    job_context.write(&entrypoint, "print('training')\n");
    job_context.entrypoint = entrypoint;
    job_context
}

#[given("the project contains \"{path}\"")]
fn project_contains(job_context: JobContext, path: String) -> JobContext {
    job_context.write(&path, "fixture\n");
    job_context
}

#[given("the platform reports \"{statuses}\"")]
fn platform_reports(job_context: JobContext, statuses: String) -> Result<JobContext, StepError> {
    for raw in statuses.split(',') {
        job_context.platform.push_status(parse_status(raw)?);
    }
    Ok(job_context)
}

#[given("the job prints \"{text}\"")]
fn job_prints(job_context: JobContext, text: String) -> JobContext {
    job_context.platform.set_output(&text);
    job_context
}

#[given("status polls fail \"{count}\" times")]
fn status_polls_fail(job_context: JobContext, count: usize) -> JobContext {
    for _ in 0..count {
        job_context.platform.push_poll_failure();
    }
    job_context
}

fn submit_with_entrypoint(
    mut job_context: JobContext,
    entrypoint: &str,
) -> Result<JobContext, StepError> {
    let request = JobRequest {
        payload: Payload::Directory {
            root: job_context.root.clone(),
            entrypoint: Utf8PathBuf::from(entrypoint),
        },
        compute_target: String::from("TEAM_POOL"),
        dependencies: vec![String::from("scikit-learn")],
        invocation_args: vec![String::from("--epochs"), String::from("2")],
        parallelism: 1,
        network_access: BTreeSet::from([String::from("ALLOW_ALL_INTEGRATION")]),
        stage: String::from("ML_JOBS_STAGE"),
        exclude_patterns: vec![String::from("__pycache__"), String::from("*.pyc")],
    };
    let submitter = JobSubmitter::new(job_context.platform.clone(), RUNTIME_IMAGE);
    let result = runtime()?.block_on(async { submitter.submit(&request).await });

    match result {
        Ok(handle) => {
            job_context.handle = Some(handle);
            job_context.outcome = Some(JobOutcome::Submitted);
        }
        Err(err) => job_context.outcome = Some(rejected(&err)),
    }
    Ok(job_context)
}

#[when("I submit the project")]
fn submit_project(job_context: JobContext) -> Result<JobContext, StepError> {
    let entrypoint = job_context.entrypoint.clone();
    submit_with_entrypoint(job_context, &entrypoint)
}

#[when("I submit the project with entrypoint \"{entrypoint}\"")]
fn submit_project_with(
    job_context: JobContext,
    entrypoint: String,
) -> Result<JobContext, StepError> {
    submit_with_entrypoint(job_context, &entrypoint)
}

fn tracker_for(job_context: &JobContext) -> JobTracker<ScriptedJobPlatform, ManualClock> {
    let policy = PollPolicy::new(Duration::from_secs(1), Duration::from_secs(8));
    JobTracker::with_clock(
        job_context.platform.clone(),
        job_context.clock.clone(),
        policy,
    )
}

#[when("I wait up to \"{seconds}\" seconds")]
fn wait_for_job(mut job_context: JobContext, seconds: u64) -> Result<JobContext, StepError> {
    let handle = job_context
        .handle
        .clone()
        .ok_or_else(|| StepError::Assertion(String::from("no job was submitted")))?;
    let tracker = tracker_for(&job_context);
    let result = runtime()?.block_on(async {
        tracker
            .wait(&handle, Duration::from_secs(seconds))
            .await
    });

    job_context.outcome = Some(match result {
        Ok(finished) => JobOutcome::Finished(finished),
        Err(err) => rejected(&err),
    });
    Ok(job_context)
}

#[when("I fetch the job output")]
fn fetch_output(mut job_context: JobContext) -> Result<JobContext, StepError> {
    let handle = job_context
        .handle
        .clone()
        .ok_or_else(|| StepError::Assertion(String::from("no job was submitted")))?;
    let tracker = tracker_for(&job_context);
    let output = runtime()?
        .block_on(async { tracker.output(&handle).await })
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    job_context.output = output;
    Ok(job_context)
}

#[then("the job output is \"{text}\"")]
fn job_output_is(job_context: &JobContext, text: String) -> Result<(), StepError> {
    if job_context.output.as_deref() == Some(text.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected output {text:?}, got {:?}",
            job_context.output
        )))
    }
}

#[then("the job output was not read")]
fn job_output_not_read(job_context: &JobContext) -> Result<(), StepError> {
    let reads = job_context.platform.output_reads();
    if reads == 0 && job_context.output.is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "output should not be read for this job; {reads} reads"
        )))
    }
}

#[then("the job result is \"{status}\"")]
fn job_result_is(job_context: &JobContext, status: String) -> Result<(), StepError> {
    match &job_context.outcome {
        Some(JobOutcome::Finished(result)) if result.status().as_str() == status => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected result {status}, got {other:?}"
        ))),
    }
}

#[then("the platform was polled \"{count}\" times")]
fn platform_polled(job_context: &JobContext, count: usize) -> Result<(), StepError> {
    let polls = job_context.platform.polls();
    if polls == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} polls, got {polls}"
        )))
    }
}

fn uploaded_files(job_context: &JobContext) -> Result<Vec<Utf8PathBuf>, StepError> {
    let uploads = job_context.platform.uploads();
    let [upload] = uploads.as_slice() else {
        return Err(StepError::Assertion(format!(
            "expected exactly one upload, got {}",
            uploads.len()
        )));
    };
    let handle = job_context
        .handle
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no job was submitted")))?;
    if handle.location() != Some(&upload.destination) {
        return Err(StepError::Assertion(format!(
            "upload went to {}, handle points at {:?}",
            upload.destination,
            handle.location()
        )));
    }
    Ok(upload.files.clone())
}

#[then("the uploaded payload contains \"{path}\"")]
fn payload_contains(job_context: &JobContext, path: String) -> Result<(), StepError> {
    let files = uploaded_files(job_context)?;
    if files.contains(&Utf8PathBuf::from(&path)) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {path} in uploaded files {files:?}"
        )))
    }
}

#[then("the uploaded payload omits \"{path}\"")]
fn payload_omits(job_context: &JobContext, path: String) -> Result<(), StepError> {
    let files = uploaded_files(job_context)?;
    if files.contains(&Utf8PathBuf::from(&path)) {
        Err(StepError::Assertion(format!(
            "{path} should have been excluded from {files:?}"
        )))
    } else {
        Ok(())
    }
}

#[then("no cancellation was requested")]
fn no_cancellation(job_context: &JobContext) -> Result<(), StepError> {
    let cancellations = job_context.platform.cancellations();
    if cancellations.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected cancellations: {cancellations:?}"
        )))
    }
}

#[then("the submission is rejected as \"{kind}\"")]
fn submission_rejected(job_context: &JobContext, kind: String) -> Result<(), StepError> {
    match &job_context.outcome {
        Some(JobOutcome::Rejected { kind: actual, .. }) if *actual == kind => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {kind} rejection, got {other:?}"
        ))),
    }
}

#[then("no remote call was made")]
fn no_remote_call(job_context: &JobContext) -> Result<(), StepError> {
    let platform = &job_context.platform;
    if platform.uploads().is_empty() && platform.submissions().is_empty() && platform.polls() == 0
    {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "the platform should not have been contacted",
        )))
    }
}

#[then("the job has no result yet")]
fn job_has_no_result(job_context: &JobContext) -> Result<(), StepError> {
    let handle = job_context
        .handle
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no job was submitted")))?;
    if handle.result().is_some() {
        return Err(StepError::Assertion(String::from(
            "a fresh submission should not carry a result",
        )));
    }
    let submissions = job_context.platform.submissions();
    let launched = submissions
        .first()
        .is_some_and(|sql| sql.starts_with("EXECUTE JOB SERVICE IN COMPUTE POOL TEAM_POOL"));
    if launched {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected launch statements: {submissions:?}"
        )))
    }
}
