//! Concurrent waits on clones of one handle.

use std::time::Duration;

use rstest::rstest;
use snowlift::test_support::ManualClock;
use snowlift::{JobHandle, JobStatus, JobTracker, PollPolicy};

use super::test_doubles::ScriptedJobPlatform;

#[rstest]
#[tokio::test]
async fn concurrent_waits_share_the_first_terminal_result() {
    let platform = ScriptedJobPlatform::new();
    for status in [JobStatus::Running, JobStatus::Failed, JobStatus::Succeeded] {
        platform.push_status(status);
    }
    let tracker = JobTracker::with_clock(
        platform.clone(),
        ManualClock::new(),
        PollPolicy::new(Duration::from_secs(1), Duration::from_secs(4)),
    );
    let first = JobHandle::attach("MLJOB_SHARED");
    let second = first.clone();
    let timeout = Duration::from_secs(600);

    let (left, right) = tokio::join!(
        tracker.wait(&first, timeout),
        tracker.wait(&second, timeout)
    );
    let left = left.unwrap_or_else(|err| panic!("first wait: {err}"));
    let right = right.unwrap_or_else(|err| panic!("second wait: {err}"));

    assert_eq!(left, right);
    assert_eq!(left.status(), JobStatus::Failed);
    assert_eq!(first.result(), Some(&left));
    assert_eq!(second.result(), Some(&left));
    assert_eq!(platform.polls(), 2, "the succeeded status must never be consumed");
}
