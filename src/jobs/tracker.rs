//! Job lifecycle tracking.
//!
//! [`JobTracker::wait`] polls a job until the platform reports a terminal
//! state or the caller's deadline passes. Poll intervals grow geometrically
//! up to a cap, and a bounded run of consecutive poll failures is tolerated
//! before the last error is surfaced. Terminal results are written into the
//! handle's shared cell so later waits return without polling.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::platform::{JobPlatform, StatusReport};

use super::clock::{Clock, TokioClock};
use super::config::JobsConfig;
use super::error::JobError;
use super::status::{JobResult, JobStatus};
use super::submit::JobHandle;

/// Poll pacing and failure tolerance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    initial: Duration,
    multiplier: u32,
    max: Duration,
    transient_retries: u32,
}

impl PollPolicy {
    /// Builds a policy that doubles from `initial` up to `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            multiplier: 2,
            max: max.max(initial),
            transient_retries: 3,
        }
    }

    /// Sets how many consecutive failed polls are retried.
    #[must_use]
    pub const fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    /// Builds the policy described by `config`.
    #[must_use]
    pub fn from_config(config: &JobsConfig) -> Self {
        Self::new(
            Duration::from_secs(config.poll_initial_secs),
            Duration::from_secs(config.poll_max_secs),
        )
        .with_transient_retries(config.transient_retries)
    }

    /// First poll interval.
    #[must_use]
    pub const fn initial(&self) -> Duration {
        self.initial
    }

    /// Consecutive failed polls retried before giving up.
    #[must_use]
    pub const fn transient_retries(&self) -> u32 {
        self.transient_retries
    }

    /// Interval that follows `current`.
    #[must_use]
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.saturating_mul(self.multiplier).min(self.max)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(30))
    }
}

/// Observes and controls submitted jobs.
#[derive(Clone, Debug)]
pub struct JobTracker<P, C = TokioClock> {
    platform: P,
    clock: C,
    policy: PollPolicy,
}

impl<P: JobPlatform> JobTracker<P> {
    /// Creates a tracker driven by the tokio timer.
    #[must_use]
    pub const fn new(platform: P, policy: PollPolicy) -> Self {
        Self {
            platform,
            clock: TokioClock,
            policy,
        }
    }
}

impl<P: JobPlatform, C: Clock> JobTracker<P, C> {
    /// Creates a tracker with an explicit time source.
    #[must_use]
    pub const fn with_clock(platform: P, clock: C, policy: PollPolicy) -> Self {
        Self {
            platform,
            clock,
            policy,
        }
    }

    /// Waits until the job reaches a terminal state or `timeout` elapses.
    ///
    /// A handle that already holds a terminal result returns it without
    /// polling. On timeout the job is left running and a `timed_out` result
    /// is returned; it is not cached, so a later wait polls again.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Platform`] when more consecutive polls fail than
    /// the policy tolerates.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        timeout: Duration,
    ) -> Result<JobResult, JobError<P::Error>> {
        if let Some(result) = handle.result() {
            debug!(job = %handle.id(), "job result already known");
            return Ok(result.clone());
        }

        let deadline = self.clock.now().checked_add(timeout);
        let mut interval = self.policy.initial;
        let mut failures = 0_u32;
        loop {
            match self.platform.job_status(handle.id()).await {
                Ok(report) => {
                    failures = 0;
                    debug!(job = %handle.id(), status = report.status.as_str(), "polled job");
                    if report.status.is_terminal() {
                        let result =
                            JobResult::new(handle.id().clone(), report.status, report.message);
                        info!(
                            job = %handle.id(),
                            status = result.status().as_str(),
                            "job finished"
                        );
                        return Ok(handle.settle(result));
                    }
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    if failures > self.policy.transient_retries {
                        return Err(JobError::Platform(err));
                    }
                    warn!(
                        job = %handle.id(),
                        attempt = failures,
                        error = %err,
                        "job status poll failed; retrying"
                    );
                }
            }

            if let Some(result) = handle.result() {
                return Ok(result.clone());
            }

            let sleep_for = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(self.clock.now());
                    if remaining.is_zero() {
                        info!(job = %handle.id(), "stopped waiting for job");
                        return Ok(JobResult::timed_out(handle.id().clone()));
                    }
                    interval.min(remaining)
                }
                None => interval,
            };
            self.clock.sleep(sleep_for).await;
            interval = self.policy.next_interval(interval);
        }
    }

    /// Polls the job once. Terminal observations are cached on the handle.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Platform`] when the poll fails.
    pub async fn status(&self, handle: &JobHandle) -> Result<StatusReport, JobError<P::Error>> {
        if let Some(result) = handle.result() {
            let mut report = StatusReport::new(result.status());
            report.message = result.exit_detail().map(str::to_owned);
            return Ok(report);
        }
        let report = self
            .platform
            .job_status(handle.id())
            .await
            .map_err(JobError::Platform)?;
        if report.status.is_terminal() {
            handle.settle(JobResult::new(
                handle.id().clone(),
                report.status,
                report.message.clone(),
            ));
        }
        Ok(report)
    }

    /// Fetches the output of a job known to have succeeded. Handles without
    /// a `succeeded` result yield `None` without a remote call.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Platform`] when the output cannot be read.
    pub async fn output(&self, handle: &JobHandle) -> Result<Option<String>, JobError<P::Error>> {
        let succeeded = handle
            .result()
            .is_some_and(|result| result.status() == JobStatus::Succeeded);
        if !succeeded {
            return Ok(None);
        }
        self.platform
            .job_output(handle.id())
            .await
            .map_err(JobError::Platform)
    }

    /// Requests cancellation. Jobs already known to be finished are left
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Platform`] when the cancel request fails.
    pub async fn cancel(&self, handle: &JobHandle) -> Result<(), JobError<P::Error>> {
        if let Some(result) = handle.result() {
            debug!(job = %handle.id(), status = result.status().as_str(), "job already finished");
            return Ok(());
        }
        self.platform
            .cancel_job(handle.id())
            .await
            .map_err(JobError::Platform)?;
        info!(job = %handle.id(), "requested job cancellation");
        Ok(())
    }
}
