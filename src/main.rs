//! Binary entry point for the `snowlift` CLI.

mod cli;

use std::fmt::Display;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use snowlift::{
    ConfigError, ConnectError, Connection, ConnectionProvider, Disconnected, EditorLocator,
    InfraConfig, InfraRecord, InfraStore, InfraStoreError, JobError, JobHandle, JobPlatform,
    JobRequest, JobResult, JobStatus, JobSubmitter, JobTracker, JobsConfig, Payload,
    PlatformError, PollPolicy, ProvisionError, ProvisionedInfra, Provisioner, RemoteConfig,
    RequestError, SessionError, SessionLauncher, SnowflakeConfig, TeardownOptions,
    provision::render_script,
};

use cli::{
    Cli, Command, ConnectCommand, DisconnectCommand, JobCommand, JobsCommand, SetupCommand,
    SubmitDirectoryCommand, SubmitFileCommand, SubmitOptions, TeardownCommand, WaitCommand,
};

const EXIT_FAILED: i32 = 2;
const EXIT_CANCELLED: i32 = 3;
const EXIT_TIMED_OUT: i32 = 124;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Provision(#[from] ProvisionError<PlatformError>),
    #[error(transparent)]
    Job(#[from] JobError<PlatformError>),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("remote session error: {0}")]
    Session(#[from] SessionError<PlatformError>),
    #[error("provisioned-infra record error: {0}")]
    Store(#[from] InfraStoreError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let mut stdout = io::stdout();
    let exit_code = match dispatch(cli, &mut stdout).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli, out: &mut dyn Write) -> Result<i32, CliError> {
    let connection = cli.connection.as_deref();
    match cli.command {
        Command::Setup(args) => setup(connection, &args, out).await,
        Command::Teardown(args) => teardown(connection, &args, out).await,
        Command::Connect(args) => connect(connection, args, out).await,
        Command::Disconnect(args) => disconnect(connection, &args, out).await,
        Command::Services => services(connection, out).await,
        Command::SubmitFile(args) => submit_file(connection, args, out).await,
        Command::SubmitDirectory(args) => submit_directory(connection, args, out).await,
        Command::Status(args) => status(connection, &args, out).await,
        Command::Wait(args) => wait(connection, &args, out).await,
        Command::Cancel(args) => cancel(connection, &args, out).await,
        Command::Jobs(args) => jobs(connection, &args, out).await,
    }
}

fn open_connection(connection: Option<&str>) -> Result<Arc<Connection>, CliError> {
    let config = SnowflakeConfig::load_without_cli_args()?.with_connection(connection);
    Ok(ConnectionProvider::new(config).get(None)?)
}

fn load_jobs_config() -> Result<JobsConfig, CliError> {
    let config = JobsConfig::load_without_cli_args()?;
    config.validate()?;
    Ok(config)
}

/// Prefers the record written by `setup`, falling back to the names the
/// current infrastructure configuration would provision.
fn resolve_infra(store: &impl InfraRecord) -> Result<ProvisionedInfra, CliError> {
    if let Some(infra) = store.load()? {
        return Ok(infra);
    }
    let spec = InfraConfig::load_without_cli_args()?.to_spec()?;
    Ok(ProvisionedInfra::from(&spec))
}

fn line(out: &mut dyn Write, text: impl Display) -> Result<(), CliError> {
    writeln!(out, "{text}")?;
    Ok(())
}

async fn setup(
    connection: Option<&str>,
    args: &SetupCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let spec = InfraConfig::load_without_cli_args()?.to_spec()?;
    line(out, render_script("snowlift setup", &spec.setup_statements()))?;
    if args.dry_run {
        return Ok(0);
    }

    let provisioner = Provisioner::new(open_connection(connection)?);
    let infra = provisioner.ensure(&spec).await?;
    let path = InfraStore::new().save(&infra)?;
    line(out, format_args!("compute pool: {}", infra.compute_pool))?;
    line(out, format_args!("stage:        @{}", infra.stage))?;
    line(out, format_args!("integration:  {}", infra.integration))?;
    line(out, format_args!("recorded in {path}"))?;
    Ok(0)
}

async fn teardown(
    connection: Option<&str>,
    args: &TeardownCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let spec = InfraConfig::load_without_cli_args()?.to_spec()?;
    let options = TeardownOptions {
        drop_stage: args.drop_stage,
        drop_database: args.drop_database,
    };
    line(
        out,
        render_script("snowlift teardown", &spec.teardown_statements(options)),
    )?;
    if args.dry_run {
        return Ok(0);
    }

    let provisioner = Provisioner::new(open_connection(connection)?);
    provisioner.teardown(&spec, options).await?;
    if InfraStore::new().clear()? {
        line(out, "removed provisioned-infra record")?;
    }
    Ok(0)
}

fn apply_remote_overrides(mut config: RemoteConfig, args: ConnectCommand) -> RemoteConfig {
    if let Some(name) = args.name {
        config.service_name = name;
    }
    if let Some(editor) = args.editor {
        config.editor = editor;
    }
    if args.pool.is_some() {
        config.compute_pool = args.pool;
    }
    if args.stage.is_some() {
        config.stage = args.stage;
    }
    if args.integration.is_some() {
        config.integration = args.integration;
    }
    config
}

async fn connect(
    connection: Option<&str>,
    args: ConnectCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let remote = apply_remote_overrides(RemoteConfig::load_without_cli_args()?, args);
    let target = remote.to_target(&resolve_infra(&InfraStore::new())?)?;
    let launcher = SessionLauncher::new(open_connection(connection)?, EditorLocator::from_env());
    let session = launcher.connect(&target).await?;

    if session.resumed {
        line(out, format_args!("resumed service {}", session.service))?;
    }
    line(
        out,
        format_args!(
            "opening {} on service {} (pool {}, stage {})",
            session.editor.kind, session.service, target.compute_pool, target.stage
        ),
    )?;
    line(out, "run `snowlift disconnect` to suspend the service")?;
    Ok(0)
}

async fn disconnect(
    connection: Option<&str>,
    args: &DisconnectCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let remote = RemoteConfig::load_without_cli_args()?;
    let service = args.name.as_deref().unwrap_or(remote.service_name.as_str());
    let launcher = SessionLauncher::new(open_connection(connection)?, EditorLocator::default());
    let message = match launcher.disconnect(service).await? {
        Disconnected::Suspended => "suspended; files on the stage are kept",
        Disconnected::AlreadySuspended => "already suspended",
        Disconnected::NotFound => "not found; nothing to stop",
    };
    line(out, format_args!("service {service} {message}"))?;
    Ok(0)
}

async fn services(connection: Option<&str>, out: &mut dyn Write) -> Result<i32, CliError> {
    let launcher = SessionLauncher::new(open_connection(connection)?, EditorLocator::default());
    let listing = launcher.list().await?;
    if listing.is_empty() {
        line(out, "no services")?;
    }
    for service in listing {
        line(
            out,
            format_args!(
                "{}\t{}\t{}",
                service.name, service.status, service.compute_pool
            ),
        )?;
    }
    Ok(0)
}

fn build_request(
    payload: Payload,
    options: &SubmitOptions,
    args: Vec<String>,
    instances: u32,
    jobs: &JobsConfig,
    infra: &ProvisionedInfra,
) -> Result<JobRequest, CliError> {
    let pool = options
        .pool
        .clone()
        .unwrap_or_else(|| infra.compute_pool.clone());
    let stage = options
        .stage
        .clone()
        .unwrap_or_else(|| jobs.job_stage.clone());
    let integrations = if options.integrations.is_empty() {
        jobs.integration_list()
    } else {
        options.integrations.clone()
    };
    Ok(JobRequest::builder(payload)
        .compute_target(pool)
        .stage(stage)
        .dependencies(options.deps.iter().cloned())
        .args(args)
        .parallelism(instances)
        .network_access(integrations)
        .exclude_patterns(jobs.exclude_list())
        .build()?)
}

async fn submit(
    connection: Option<&str>,
    payload: Payload,
    options: SubmitOptions,
    args: Vec<String>,
    instances: u32,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let jobs = load_jobs_config()?;
    let infra = resolve_infra(&InfraStore::new())?;
    let request = build_request(payload, &options, args, instances, &jobs, &infra)?;

    let platform = open_connection(connection)?;
    let submitter = JobSubmitter::new(Arc::clone(&platform), jobs.runtime_image.as_str());
    let handle = submitter.submit(&request).await?;
    line(out, handle.id())?;
    if !options.wait {
        return Ok(0);
    }

    let timeout = options
        .timeout
        .map_or_else(|| jobs.timeout(), Duration::from_secs);
    let tracker = JobTracker::new(platform, PollPolicy::from_config(&jobs));
    let result = tracker.wait(&handle, timeout).await?;
    write_result(out, &result)?;
    write_output(out, &tracker, &handle).await?;
    Ok(exit_code(result.status()))
}

async fn submit_file(
    connection: Option<&str>,
    args: SubmitFileCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let payload = Payload::File {
        path: Utf8PathBuf::from(args.file),
    };
    submit(connection, payload, args.options, args.args, 1, out).await
}

async fn submit_directory(
    connection: Option<&str>,
    args: SubmitDirectoryCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let payload = Payload::Directory {
        root: Utf8PathBuf::from(args.dir),
        entrypoint: Utf8PathBuf::from(args.entrypoint),
    };
    submit(
        connection,
        payload,
        args.options,
        args.args,
        args.instances,
        out,
    )
    .await
}

async fn status(
    connection: Option<&str>,
    args: &JobCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let jobs = load_jobs_config()?;
    let tracker = JobTracker::new(
        open_connection(connection)?,
        PollPolicy::from_config(&jobs),
    );
    let handle = JobHandle::attach(args.job.as_str());
    let report = tracker.status(&handle).await?;
    match report.message {
        Some(message) => line(
            out,
            format_args!("{}\t{}\t{message}", args.job, report.status),
        )?,
        None => line(out, format_args!("{}\t{}", args.job, report.status))?,
    }
    write_output(out, &tracker, &handle).await?;
    Ok(exit_code(report.status))
}

async fn wait(
    connection: Option<&str>,
    args: &WaitCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let jobs = load_jobs_config()?;
    let timeout = args
        .timeout
        .map_or_else(|| jobs.timeout(), Duration::from_secs);
    let tracker = JobTracker::new(
        open_connection(connection)?,
        PollPolicy::from_config(&jobs),
    );
    let handle = JobHandle::attach(args.job.as_str());
    let result = tracker.wait(&handle, timeout).await?;
    write_result(out, &result)?;
    write_output(out, &tracker, &handle).await?;
    Ok(exit_code(result.status()))
}

async fn cancel(
    connection: Option<&str>,
    args: &JobCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let tracker = JobTracker::new(open_connection(connection)?, PollPolicy::default());
    tracker.cancel(&JobHandle::attach(args.job.as_str())).await?;
    line(out, format_args!("cancellation requested for {}", args.job))?;
    Ok(0)
}

async fn jobs(
    connection: Option<&str>,
    args: &JobsCommand,
    out: &mut dyn Write,
) -> Result<i32, CliError> {
    let platform = open_connection(connection)?;
    let listing = platform.list_jobs(args.limit).await?;
    if listing.is_empty() {
        line(out, "no jobs")?;
    }
    for job in listing {
        line(
            out,
            format_args!("{}\t{}\t{}", job.id, job.status, job.compute_pool),
        )?;
    }
    Ok(0)
}

fn write_result(out: &mut dyn Write, result: &JobResult) -> Result<(), CliError> {
    match result.exit_detail() {
        Some(detail) => line(
            out,
            format_args!("{}\t{}\t{detail}", result.identifier(), result.status()),
        ),
        None => line(
            out,
            format_args!("{}\t{}", result.identifier(), result.status()),
        ),
    }
}

/// Prints what a succeeded job wrote. Reading it is best effort: the job
/// outcome is already known, so a failed read only logs a warning.
async fn write_output(
    out: &mut dyn Write,
    tracker: &JobTracker<Arc<Connection>>,
    handle: &JobHandle,
) -> Result<(), CliError> {
    match tracker.output(handle).await {
        Ok(Some(output)) => {
            line(out, "output:")?;
            line(out, output)
        }
        Ok(None) => Ok(()),
        Err(err) => {
            warn!(job = %handle.id(), error = %err, "could not read job output");
            Ok(())
        }
    }
}

const fn exit_code(status: JobStatus) -> i32 {
    match status {
        JobStatus::Queued | JobStatus::Running | JobStatus::Succeeded => 0,
        JobStatus::Failed => EXIT_FAILED,
        JobStatus::Cancelled => EXIT_CANCELLED,
        JobStatus::TimedOut => EXIT_TIMED_OUT,
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}
