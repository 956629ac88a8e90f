//! Job status normalisation and terminal results.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::platform::JobId;

/// Normalised job state.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted but not yet scheduled.
    Queued,
    /// Executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Cancelled,
    /// The local wait deadline passed; the job itself may still be running.
    TimedOut,
}

impl JobStatus {
    /// Snake-case name used in output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }

    /// Whether the platform will never report a different state.
    ///
    /// `TimedOut` is local and therefore not terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Maps a platform status string, ignoring case. Unrecognised values are
    /// treated as still running.
    #[must_use]
    pub fn from_platform(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "QUEUED" | "UNKNOWN" => Self::Queued,
            "RUNNING" | "READY" | "CANCELLING" => Self::Running,
            "DONE" | "SUCCEEDED" => Self::Succeeded,
            "FAILED" | "INTERNAL_ERROR" => Self::Failed,
            "CANCELLED" | "DELETED" | "SUSPENDED" => Self::Cancelled,
            other => {
                warn!(status = other, "unrecognised platform status; treating as running");
                Self::Running
            }
        }
    }

    /// Combines per-container states into one job state: any failure wins,
    /// then any cancellation, then unanimous success; otherwise the least
    /// advanced state. An empty set means nothing has been scheduled yet.
    #[must_use]
    pub fn aggregate(statuses: impl IntoIterator<Item = Self>) -> Self {
        let mut seen_any = false;
        let mut all_succeeded = true;
        let mut cancelled = false;
        let mut queued = false;
        for status in statuses {
            seen_any = true;
            match status {
                Self::Failed => return Self::Failed,
                Self::Cancelled => cancelled = true,
                Self::Queued => queued = true,
                Self::Succeeded | Self::Running | Self::TimedOut => {}
            }
            all_succeeded &= status == Self::Succeeded;
        }

        if !seen_any || (queued && !cancelled) {
            return Self::Queued;
        }
        if cancelled {
            Self::Cancelled
        } else if all_succeeded {
            Self::Succeeded
        } else {
            Self::Running
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Outcome of waiting on a job. Never changes once created.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct JobResult {
    identifier: JobId,
    normalized_status: JobStatus,
    exit_detail: Option<String>,
}

impl JobResult {
    /// Builds a result. `exit_detail` is kept only for failed or cancelled
    /// jobs.
    #[must_use]
    pub fn new(identifier: JobId, status: JobStatus, exit_detail: Option<String>) -> Self {
        let detail = match status {
            JobStatus::Failed | JobStatus::Cancelled => exit_detail,
            _ => None,
        };
        Self {
            identifier,
            normalized_status: status,
            exit_detail: detail,
        }
    }

    /// Builds the local timeout outcome.
    #[must_use]
    pub const fn timed_out(identifier: JobId) -> Self {
        Self {
            identifier,
            normalized_status: JobStatus::TimedOut,
            exit_detail: None,
        }
    }

    /// Job identifier.
    #[must_use]
    pub const fn identifier(&self) -> &JobId {
        &self.identifier
    }

    /// Normalised status.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.normalized_status
    }

    /// Platform-provided failure or cancellation detail.
    #[must_use]
    pub fn exit_detail(&self) -> Option<&str> {
        self.exit_detail.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PENDING", JobStatus::Queued)]
    #[case("queued", JobStatus::Queued)]
    #[case("Unknown", JobStatus::Queued)]
    #[case("RUNNING", JobStatus::Running)]
    #[case("READY", JobStatus::Running)]
    #[case("CANCELLING", JobStatus::Running)]
    #[case("DONE", JobStatus::Succeeded)]
    #[case("succeeded", JobStatus::Succeeded)]
    #[case("FAILED", JobStatus::Failed)]
    #[case("INTERNAL_ERROR", JobStatus::Failed)]
    #[case("CANCELLED", JobStatus::Cancelled)]
    #[case("DELETED", JobStatus::Cancelled)]
    #[case("SUSPENDED", JobStatus::Cancelled)]
    #[case("WARMING_UP", JobStatus::Running)]
    fn maps_platform_status(#[case] raw: &str, #[case] expected: JobStatus) {
        assert_eq!(JobStatus::from_platform(raw), expected);
    }

    #[rstest]
    #[case(&[], JobStatus::Queued)]
    #[case(&[JobStatus::Succeeded, JobStatus::Succeeded], JobStatus::Succeeded)]
    #[case(&[JobStatus::Succeeded, JobStatus::Running], JobStatus::Running)]
    #[case(&[JobStatus::Running, JobStatus::Queued], JobStatus::Queued)]
    #[case(&[JobStatus::Cancelled, JobStatus::Running], JobStatus::Cancelled)]
    #[case(&[JobStatus::Queued, JobStatus::Cancelled], JobStatus::Cancelled)]
    #[case(&[JobStatus::Cancelled, JobStatus::Failed], JobStatus::Failed)]
    #[case(&[JobStatus::Succeeded, JobStatus::Failed], JobStatus::Failed)]
    fn aggregates_container_states(#[case] states: &[JobStatus], #[case] expected: JobStatus) {
        assert_eq!(JobStatus::aggregate(states.iter().copied()), expected);
    }

    #[test]
    fn exit_detail_is_dropped_for_success() {
        let result = JobResult::new(
            JobId::from("MLJOB_1"),
            JobStatus::Succeeded,
            Some(String::from("ignored")),
        );
        assert_eq!(result.exit_detail(), None);

        let failed = JobResult::new(
            JobId::from("MLJOB_1"),
            JobStatus::Failed,
            Some(String::from("exit code 1")),
        );
        assert_eq!(failed.exit_detail(), Some("exit code 1"));
    }

    #[test]
    fn timed_out_is_not_terminal() {
        assert!(!JobStatus::TimedOut.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
