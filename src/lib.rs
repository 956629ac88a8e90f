//! Core library for the `snowlift` ML platform tool.
//!
//! The crate drives a managed data/ML platform through its `snow` client:
//! [`Provisioner`] creates the objects a workload needs, [`JobSubmitter`] and
//! [`JobTracker`] run local Python payloads as platform jobs, and
//! [`SessionLauncher`] opens a local editor against a remote development
//! container. Every platform call goes through the traits in [`platform`], so
//! the orchestration logic can be exercised against scripted doubles.

pub mod command;
pub mod config;
pub mod connection;
pub mod infra_store;
pub mod jobs;
pub mod platform;
pub mod provision;
pub mod remote;
pub mod test_support;

pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, SnowflakeConfig};
pub use connection::{
    AuthMethod, ConnectError, Connection, ConnectionProfile, ConnectionProvider, PlatformError,
    ProfileError, ProfileStore,
};
pub use infra_store::{InfraRecord, InfraStore, InfraStoreError};
pub use jobs::{
    JobError, JobHandle, JobRequest, JobResult, JobStatus, JobSubmitter, JobTracker, JobsConfig,
    Payload, PollPolicy, RequestError,
};
pub use platform::{JobId, JobPlatform, Platform, ServicePlatform, StageLocation};
pub use provision::{
    InfraConfig, InfraSpec, ProvisionError, ProvisionedInfra, Provisioner, TeardownOptions,
};
pub use remote::{
    Disconnected, EditorKind, EditorLocator, RemoteConfig, SessionError, SessionLauncher,
    SessionTarget,
};
