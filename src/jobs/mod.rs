//! Job submission and lifecycle tracking.
//!
//! A [`JobRequest`] is validated locally, its payload staged and uploaded,
//! and the job launched asynchronously by [`JobSubmitter`]. The returned
//! [`JobHandle`] is then polled by [`JobTracker`] until the job finishes.

mod clock;
mod config;
mod error;
mod manifest;
mod request;
mod staging;
mod status;
mod submit;
mod tracker;

pub use clock::{Clock, Sleep, TokioClock};
pub use config::JobsConfig;
pub use error::{JobError, RequestError, StagingError};
pub use manifest::{CONTAINER_NAME, JobSubmission, MOUNT_PATH, generate_job_name};
pub use request::{JobRequest, JobRequestBuilder, Payload};
pub use staging::{ExcludePatterns, StagedPayload, stage_payload};
pub use status::{JobResult, JobStatus};
pub use submit::{JobHandle, JobSubmitter};
pub use tracker::{JobTracker, PollPolicy};
