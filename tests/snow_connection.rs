//! `snow`-backed platform behaviour, driven through a scripted runner.

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use serde_json::json;
use snowlift::platform::ServiceState;
use snowlift::provision::Statement;
use snowlift::remote::TunnelRequest;
use snowlift::test_support::ScriptedRunner;
use snowlift::{
    AuthMethod, Connection, ConnectionProfile, EditorKind, JobId, JobPlatform, JobStatus,
    Platform, PlatformError, ServicePlatform, StageLocation,
};
use tempfile::TempDir;

#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

fn connection(runner: &ScriptedRunner) -> Connection<ScriptedRunner> {
    let profile = ConnectionProfile {
        name: String::from("dev"),
        account: String::from("acme-xy12345"),
        user: String::from("ML_USER"),
        warehouse: Some(String::from("COMPUTE_WH")),
        database: None,
        role: None,
        auth: AuthMethod::Password,
    };
    Connection::new(runner.clone(), "snow", profile)
}

fn status_rows(containers: &serde_json::Value) -> String {
    json!([{ "STATUS": containers.to_string() }]).to_string()
}

#[rstest]
#[tokio::test]
async fn job_status_aggregates_containers(runner: ScriptedRunner) {
    runner.push_stdout(status_rows(&json!([
        { "status": "DONE", "message": "Completed successfully" },
        { "status": "FAILED", "message": "exit code 1" },
    ])));
    let conn = connection(&runner);

    let report = conn
        .job_status(&JobId::new("ML.PUBLIC.MLJOB_1"))
        .await
        .unwrap_or_else(|err| panic!("status should parse: {err}"));

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.message.as_deref(), Some("exit code 1"));
    let invocations = runner.invocations();
    let [call] = invocations.as_slice() else {
        panic!("expected one invocation, got {invocations:?}");
    };
    assert_eq!(
        call.flag_value("--query").as_deref(),
        Some("SELECT SYSTEM$GET_SERVICE_STATUS('ML.PUBLIC.MLJOB_1') AS STATUS")
    );
    assert_eq!(call.flag_value("--connection").as_deref(), Some("dev"));
}

#[rstest]
#[tokio::test]
async fn pending_containers_read_as_queued(runner: ScriptedRunner) {
    runner.push_stdout(status_rows(&json!([{ "status": "PENDING" }])));
    let conn = connection(&runner);

    let report = conn
        .job_status(&JobId::new("MLJOB_2"))
        .await
        .unwrap_or_else(|err| panic!("status should parse: {err}"));

    assert_eq!(report.status, JobStatus::Queued);
    assert_eq!(report.raw, "PENDING");
}

#[rstest]
#[tokio::test]
async fn command_failures_keep_stderr(runner: ScriptedRunner) {
    runner.push_failure(1, "SQL compilation error: Service does not exist");
    let conn = connection(&runner);

    let Err(PlatformError::CommandFailure { action, stderr, .. }) =
        conn.job_status(&JobId::new("MLJOB_3")).await
    else {
        panic!("failed query should surface a command failure");
    };
    assert_eq!(action, "sql");
    assert!(stderr.contains("does not exist"));
}

#[rstest]
#[tokio::test]
async fn missing_client_is_a_spawn_error(runner: ScriptedRunner) {
    runner.push_spawn_error("snow");
    let conn = connection(&runner);

    let result = conn.list_jobs(5).await;
    assert!(matches!(result, Err(PlatformError::Spawn(_))));
}

#[rstest]
#[case::file(false)]
#[case::directory(true)]
#[tokio::test]
async fn upload_creates_stage_then_copies(runner: ScriptedRunner, #[case] directory: bool) {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 path {}", path.display()));
    let source = if directory {
        root.clone()
    } else {
        let file = root.join("train.py");
        std::fs::write(&file, "print('hi')\n").unwrap_or_else(|err| panic!("write: {err}"));
        file
    };
    runner.push_stdout("[]");
    runner.push_success();
    let conn = connection(&runner);

    conn.upload(&source, &StageLocation::new("ML_JOBS_STAGE", "MLJOB_4"))
        .await
        .unwrap_or_else(|err| panic!("upload should succeed: {err}"));

    let invocations = runner.invocations();
    let [create, copy] = invocations.as_slice() else {
        panic!("expected two invocations, got {invocations:?}");
    };
    assert_eq!(
        create.flag_value("--query").as_deref(),
        Some("CREATE STAGE IF NOT EXISTS ML_JOBS_STAGE")
    );
    let command = copy.command_string();
    assert!(
        command.starts_with(&format!(
            "snow stage copy {source} @ML_JOBS_STAGE/MLJOB_4/ --overwrite"
        )),
        "command: {command}"
    );
    assert_eq!(command.contains("--recursive"), directory);
}

#[rstest]
#[tokio::test]
async fn cancel_drops_the_job_service(runner: ScriptedRunner) {
    runner.push_stdout("[]");
    let conn = connection(&runner);

    conn.cancel_job(&JobId::new("ML.PUBLIC.MLJOB_5"))
        .await
        .unwrap_or_else(|err| panic!("cancel should succeed: {err}"));

    let invocations = runner.invocations();
    assert_eq!(
        invocations.first().and_then(|call| call.flag_value("--query")).as_deref(),
        Some("DROP SERVICE IF EXISTS ML.PUBLIC.MLJOB_5")
    );
}

#[rstest]
#[case::logs(
    json!([{ "LOGS": "epoch 1 loss 0.40\naccuracy=0.93\n" }]),
    Some("epoch 1 loss 0.40\naccuracy=0.93")
)]
#[case::blank(json!([{ "LOGS": "  \n" }]), None)]
#[case::no_rows(json!([]), None)]
#[tokio::test]
async fn job_output_reads_container_logs(
    runner: ScriptedRunner,
    #[case] rows: serde_json::Value,
    #[case] expected: Option<&str>,
) {
    runner.push_stdout(rows.to_string());
    let conn = connection(&runner);

    let output = conn
        .job_output(&JobId::new("ML.PUBLIC.MLJOB_6"))
        .await
        .unwrap_or_else(|err| panic!("logs should parse: {err}"));

    assert_eq!(output.as_deref(), expected);
    assert_eq!(
        runner
            .invocations()
            .first()
            .and_then(|call| call.flag_value("--query"))
            .as_deref(),
        Some("SELECT SYSTEM$GET_SERVICE_LOGS('ML.PUBLIC.MLJOB_6', 0, 'main') AS LOGS")
    );
}

#[rstest]
#[tokio::test]
async fn job_output_failure_keeps_stderr(runner: ScriptedRunner) {
    runner.push_failure(1, "Service ML.PUBLIC.MLJOB_7 does not exist");
    let conn = connection(&runner);

    let Err(PlatformError::CommandFailure { stderr, .. }) =
        conn.job_output(&JobId::new("ML.PUBLIC.MLJOB_7")).await
    else {
        panic!("missing service should surface a command failure");
    };
    assert!(stderr.contains("does not exist"), "stderr: {stderr}");
}

#[rstest]
#[tokio::test]
async fn list_jobs_reads_rows(runner: ScriptedRunner) {
    runner.push_stdout(
        json!([
            { "name": "MLJOB_A", "status": "DONE", "compute_pool": "POOL" },
            { "name": "MLJOB_B", "status": "RUNNING", "compute_pool": "POOL" },
        ])
        .to_string(),
    );
    let conn = connection(&runner);

    let jobs = conn
        .list_jobs(1)
        .await
        .unwrap_or_else(|err| panic!("listing should parse: {err}"));

    let ids: Vec<&str> = jobs.iter().map(|job| job.id.as_str()).collect();
    assert_eq!(ids, ["MLJOB_A"]);
}

#[rstest]
#[case::suspended(json!([{ "name": "DEV", "status": "SUSPENDED" }]), Some(ServiceState::Suspended))]
#[case::running(json!([{ "name": "DEV", "status": "READY" }]), Some(ServiceState::Running))]
#[case::missing(json!([]), None)]
#[tokio::test]
async fn service_state_matches_name_case_insensitively(
    runner: ScriptedRunner,
    #[case] rows: serde_json::Value,
    #[case] expected: Option<ServiceState>,
) {
    runner.push_stdout(rows.to_string());
    let conn = connection(&runner);

    let state = conn
        .service_state("dev")
        .await
        .unwrap_or_else(|err| panic!("state should parse: {err}"));

    assert_eq!(state, expected);
}

#[rstest]
#[tokio::test]
async fn execute_batch_sends_one_script(runner: ScriptedRunner) {
    runner.push_stdout("[[],[]]");
    let conn = connection(&runner);
    let statements = [
        Statement::UseRole(String::from("ACCOUNTADMIN")),
        Statement::alter(
            snowlift::provision::ObjectKind::ComputePool,
            "POOL",
            "SUSPEND",
        ),
    ];

    conn.execute_batch(&statements)
        .await
        .unwrap_or_else(|err| panic!("batch should succeed: {err}"));

    let invocations = runner.invocations();
    assert_eq!(
        invocations.first().and_then(|call| call.flag_value("--query")).as_deref(),
        Some("USE ROLE ACCOUNTADMIN;\nALTER COMPUTE POOL IF EXISTS POOL SUSPEND;")
    );
}

#[rstest]
#[tokio::test]
async fn editor_tunnel_runs_detached_with_editor_on_path(runner: ScriptedRunner) {
    let conn = connection(&runner);
    let request = TunnelRequest {
        editor: EditorKind::Code,
        service: String::from("dev"),
        compute_pool: String::from("POOL"),
        integration: String::from("EAI"),
        stage: String::from("@DB.PUBLIC.DEV_STAGE"),
        editor_dir: Some(Utf8PathBuf::from("/opt/editor/bin")),
    };

    conn.open_editor_tunnel(&request)
        .await
        .unwrap_or_else(|err| panic!("tunnel should start: {err}"));

    assert!(runner.invocations().is_empty());
    let detached = runner.detached();
    let [launch] = detached.as_slice() else {
        panic!("expected one detached launch, got {detached:?}");
    };
    assert_eq!(
        launch.command.command_string(),
        "snow remote code dev --compute-pool POOL --eai-name EAI \
         --stage @DB.PUBLIC.DEV_STAGE --connection dev"
    );
    let path = launch
        .env
        .iter()
        .find(|(key, _)| key == "PATH")
        .map(|(_, value)| value.to_string_lossy().into_owned())
        .unwrap_or_default();
    assert!(path.starts_with("/opt/editor/bin"), "PATH: {path}");
}
