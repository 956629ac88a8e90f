//! BDD scenarios for the job lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{JobContext, job_context};

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Wait resolves once the job succeeds"
)]
fn scenario_wait_until_succeeded(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A finished job answers later waits without polling"
)]
fn scenario_cached_result(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Waiting past the deadline leaves the job running"
)]
fn scenario_wait_timeout(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A missing entrypoint is rejected before any remote call"
)]
fn scenario_missing_entrypoint(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Submitting returns without waiting"
)]
fn scenario_submit_only(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Transient polling failures are retried"
)]
fn scenario_transient_failures(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Persistent polling failures surface a platform error"
)]
fn scenario_persistent_failures(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Excluded files stay out of the payload"
)]
fn scenario_excluded_files(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A succeeded job's output is read after waiting"
)]
fn scenario_output_after_success(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A failed job's output is not read"
)]
fn scenario_no_output_after_failure(job_context: JobContext) {
    let _ = job_context;
}
