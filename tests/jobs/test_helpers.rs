//! Shared fixtures for job lifecycle scenarios.

use std::fs;
use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use snowlift::test_support::ManualClock;
use snowlift::{JobHandle, JobResult};
use tempfile::TempDir;

use super::test_doubles::ScriptedJobPlatform;

#[derive(Clone, Debug)]
pub struct JobContext {
    pub platform: ScriptedJobPlatform,
    pub clock: ManualClock,
    pub root: Utf8PathBuf,
    pub entrypoint: String,
    pub handle: Option<JobHandle>,
    pub outcome: Option<JobOutcome>,
    pub output: Option<String>,
    pub(crate) project_tmp: Arc<TempDir>,
}

#[derive(Clone, Debug)]
pub enum JobOutcome {
    Submitted,
    Finished(JobResult),
    Rejected { kind: String, message: String },
}

impl JobContext {
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|err| panic!("create parent directories for {path}: {err}"));
        }
        fs::write(&path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
    }
}

#[fixture]
pub fn job_context() -> JobContext {
    let project_tmp =
        TempDir::new().unwrap_or_else(|err| panic!("create project temp directory: {err}"));
    let root = Utf8PathBuf::from_path_buf(project_tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 tempdir path: {}", path.display()));

    JobContext {
        platform: ScriptedJobPlatform::new(),
        clock: ManualClock::new(),
        root,
        entrypoint: String::from("train.py"),
        handle: None,
        outcome: None,
        output: None,
        project_tmp: Arc::new(project_tmp),
    }
}
