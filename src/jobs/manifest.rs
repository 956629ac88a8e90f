//! Job service specifications and the statement that launches them.
//!
//! A submission mounts the job's stage directory into a single container,
//! installs the requested packages, and runs the entrypoint from the mount.

use serde_json::json;
use shell_escape::unix::escape;
use uuid::Uuid;

use crate::platform::{JobId, StageLocation};

use super::request::JobRequest;

/// Path the stage directory is mounted at inside the job container.
pub const MOUNT_PATH: &str = "/mnt/job_stage";

/// Name of the single container a job runs in.
pub const CONTAINER_NAME: &str = "main";
const VOLUME_NAME: &str = "job-stage";

/// Returns a fresh `MLJOB_<hex>` job name.
#[must_use]
pub fn generate_job_name() -> String {
    format!(
        "MLJOB_{}",
        Uuid::new_v4().simple().to_string().to_ascii_uppercase()
    )
}

/// Everything the platform needs to start a job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobSubmission {
    job_id: JobId,
    compute_pool: String,
    location: StageLocation,
    command: String,
    spec: String,
    integrations: Vec<String>,
    replicas: u32,
}

impl JobSubmission {
    /// Describes `request` under a newly generated job name.
    #[must_use]
    pub fn new(request: &JobRequest, runtime_image: &str) -> Self {
        Self::named(&generate_job_name(), request, runtime_image)
    }

    /// Describes `request` under `name`. The job identifier is qualified with
    /// the stage's database and schema when the stage name carries them.
    #[must_use]
    pub fn named(name: &str, request: &JobRequest, runtime_image: &str) -> Self {
        let location = StageLocation::new(request.stage.as_str(), name);
        let job_id = location.namespace().map_or_else(
            || JobId::new(name),
            |namespace| JobId::new(format!("{namespace}.{name}")),
        );
        let command = container_command(request);
        let spec = json!({
            "spec": {
                "containers": [{
                    "name": CONTAINER_NAME,
                    "image": runtime_image,
                    "command": ["/bin/bash", "-c", command],
                    "volumeMounts": [{ "name": VOLUME_NAME, "mountPath": MOUNT_PATH }],
                }],
                "volumes": [{ "name": VOLUME_NAME, "source": location.uri() }],
            }
        })
        .to_string();

        Self {
            job_id,
            compute_pool: request.compute_target.clone(),
            location,
            command,
            spec,
            integrations: request.network_access.iter().cloned().collect(),
            replicas: request.parallelism,
        }
    }

    /// Identifier the platform knows the job by.
    #[must_use]
    pub const fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Stage directory the payload is uploaded to.
    #[must_use]
    pub const fn location(&self) -> &StageLocation {
        &self.location
    }

    /// Shell command run inside the container.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// JSON service specification.
    #[must_use]
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Compute pool the job runs on.
    #[must_use]
    pub fn compute_pool(&self) -> &str {
        &self.compute_pool
    }

    /// Statement that launches the job asynchronously.
    #[must_use]
    pub fn sql(&self) -> String {
        let mut sql = format!(
            "EXECUTE JOB SERVICE IN COMPUTE POOL {pool} FROM SPECIFICATION $${spec}$$ \
             NAME = {name} ASYNC = TRUE",
            pool = self.compute_pool,
            spec = self.spec,
            name = self.job_id,
        );
        if !self.integrations.is_empty() {
            sql.push_str(" EXTERNAL_ACCESS_INTEGRATIONS = (");
            sql.push_str(&self.integrations.join(", "));
            sql.push(')');
        }
        if self.replicas > 1 {
            sql.push_str(" REPLICAS = ");
            sql.push_str(&self.replicas.to_string());
        }
        sql
    }
}

fn container_command(request: &JobRequest) -> String {
    let mut command = format!("set -e; cd {MOUNT_PATH}");
    if !request.dependencies.is_empty() {
        command.push_str(" && pip install");
        for dependency in &request.dependencies {
            command.push(' ');
            command.push_str(escape(dependency.as_str().into()).as_ref());
        }
    }
    command.push_str(" && python ");
    command.push_str(escape(request.payload.entrypoint().into()).as_ref());
    for arg in &request.invocation_args {
        command.push(' ');
        command.push_str(escape(arg.as_str().into()).as_ref());
    }
    command
}
