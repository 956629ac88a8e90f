//! Command-line interface definitions for the `snowlift` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `snowlift` binary.
#[derive(Debug, Parser)]
#[command(
    name = "snowlift",
    about = "Provision ML infrastructure, run jobs, and open remote dev sessions on Snowflake",
    version,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Connection profile to use instead of the configured default.
    #[arg(short = 'c', long, global = true, value_name = "NAME")]
    pub(crate) connection: Option<String>,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands understood by `snowlift`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create the database, network rule, integration, stage, and pool.
    #[command(name = "setup")]
    Setup(SetupCommand),
    /// Drop the objects created by `setup`.
    #[command(name = "teardown")]
    Teardown(TeardownCommand),
    /// Open a local editor attached to the remote development service.
    #[command(name = "connect")]
    Connect(ConnectCommand),
    /// Suspend the remote development service.
    #[command(name = "disconnect")]
    Disconnect(DisconnectCommand),
    /// List container services.
    #[command(name = "services")]
    Services,
    /// Submit a single Python file as a job.
    #[command(name = "submit-file")]
    SubmitFile(SubmitFileCommand),
    /// Submit a directory with an entrypoint as a job.
    #[command(name = "submit-directory")]
    SubmitDirectory(SubmitDirectoryCommand),
    /// Show a job's current status.
    #[command(name = "status")]
    Status(JobCommand),
    /// Wait for a job to finish.
    #[command(name = "wait")]
    Wait(WaitCommand),
    /// Request cancellation of a job.
    #[command(name = "cancel")]
    Cancel(JobCommand),
    /// List recent jobs.
    #[command(name = "jobs")]
    Jobs(JobsCommand),
}

/// Arguments for `snowlift setup`.
#[derive(Debug, Args)]
pub(crate) struct SetupCommand {
    /// Print the statements without executing them.
    #[arg(long)]
    pub(crate) dry_run: bool,
}

/// Arguments for `snowlift teardown`.
#[derive(Debug, Args)]
pub(crate) struct TeardownCommand {
    /// Also drop the stage and the files on it.
    #[arg(long)]
    pub(crate) drop_stage: bool,
    /// Also drop the database.
    #[arg(long)]
    pub(crate) drop_database: bool,
    /// Print the statements without executing them.
    #[arg(long)]
    pub(crate) dry_run: bool,
}

/// Arguments for `snowlift connect`.
#[derive(Debug, Default, Args)]
pub(crate) struct ConnectCommand {
    /// Development service name.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Editor to open: `cursor` or `code`.
    #[arg(short = 'e', long, value_name = "EDITOR")]
    pub(crate) editor: Option<String>,
    /// Compute pool hosting the service.
    #[arg(short = 'p', long, value_name = "POOL")]
    pub(crate) pool: Option<String>,
    /// Stage synchronised with the container.
    #[arg(short = 's', long, value_name = "STAGE")]
    pub(crate) stage: Option<String>,
    /// External access integration.
    #[arg(long, value_name = "NAME")]
    pub(crate) integration: Option<String>,
}

/// Arguments for `snowlift disconnect`.
#[derive(Debug, Args)]
pub(crate) struct DisconnectCommand {
    /// Development service name.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub(crate) name: Option<String>,
}

/// Options shared by the submission subcommands.
#[derive(Debug, Default, Args)]
pub(crate) struct SubmitOptions {
    /// Compute pool to run on; defaults to the provisioned pool.
    #[arg(short = 'p', long, value_name = "POOL")]
    pub(crate) pool: Option<String>,
    /// Stage that receives the payload.
    #[arg(long, value_name = "STAGE")]
    pub(crate) stage: Option<String>,
    /// Package to install before running (repeatable).
    #[arg(long = "dep", value_name = "PACKAGE")]
    pub(crate) deps: Vec<String>,
    /// External access integration to grant (repeatable).
    #[arg(long = "integration", value_name = "NAME")]
    pub(crate) integrations: Vec<String>,
    /// Wait for the job to finish and exit with its outcome.
    #[arg(long)]
    pub(crate) wait: bool,
    /// Seconds to wait before giving up when `--wait` is set.
    #[arg(long, value_name = "SECONDS", requires = "wait")]
    pub(crate) timeout: Option<u64>,
}

/// Arguments for `snowlift submit-file`.
#[derive(Debug, Args)]
pub(crate) struct SubmitFileCommand {
    /// Python file to run.
    #[arg(value_name = "FILE")]
    pub(crate) file: String,
    /// Shared submission options.
    #[command(flatten)]
    pub(crate) options: SubmitOptions,
    /// Arguments passed to the script (use -- to separate flags).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub(crate) args: Vec<String>,
}

/// Arguments for `snowlift submit-directory`.
#[derive(Debug, Args)]
pub(crate) struct SubmitDirectoryCommand {
    /// Directory to upload.
    #[arg(value_name = "DIR")]
    pub(crate) dir: String,
    /// Script to run, relative to the directory.
    #[arg(long, value_name = "PATH")]
    pub(crate) entrypoint: String,
    /// Number of instances to run on.
    #[arg(long, value_name = "COUNT", default_value_t = 1)]
    pub(crate) instances: u32,
    /// Shared submission options.
    #[command(flatten)]
    pub(crate) options: SubmitOptions,
    /// Arguments passed to the entrypoint (use -- to separate flags).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub(crate) args: Vec<String>,
}

/// Arguments naming a single job.
#[derive(Debug, Args)]
pub(crate) struct JobCommand {
    /// Job identifier printed by a submit command.
    #[arg(value_name = "JOB")]
    pub(crate) job: String,
}

/// Arguments for `snowlift wait`.
#[derive(Debug, Args)]
pub(crate) struct WaitCommand {
    /// Job identifier printed by a submit command.
    #[arg(value_name = "JOB")]
    pub(crate) job: String,
    /// Seconds to wait before giving up.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,
}

/// Arguments for `snowlift jobs`.
#[derive(Debug, Args)]
pub(crate) struct JobsCommand {
    /// Maximum number of jobs to list.
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = 20,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub(crate) limit: usize,
}
