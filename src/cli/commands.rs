//! CLI command definitions for ci-pilot.
//!
//! One orchestration run per invocation. All configuration recognized by
//! the pipeline is externalized here as flags with environment-variable
//! fallbacks; nothing is a hard-coded global.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use crate::config::PilotConfig;
use crate::error::OrchestratorError;
use crate::orchestrator::{self, RunOutcome};
use crate::poll::cancel_channel;

/// Default Jenkins base URL.
const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";

/// Default job driven by the pipeline.
const DEFAULT_JOB_NAME: &str = "arc_job";

/// Bootstrap a Jenkins-in-Docker CI controller and drive a build.
#[derive(Parser)]
#[command(name = "ci-pilot")]
#[command(about = "Bootstrap a Jenkins-in-Docker CI controller, sync a job and drive a build")]
#[command(version)]
#[command(
    long_about = "ci-pilot ensures a Jenkins server is running inside Docker (building the \
image if needed), waits for it to accept connections, creates or updates a build job, \
triggers a build, waits for it to finish and saves the console log.\n\nExample usage:\n  \
ci-pilot run --api-token $JENKINS_API_TOKEN --repo-url https://github.com/arya2004/arc"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full bootstrap-and-build sequence once.
    Run(RunArgs),
}

/// Arguments for `ci-pilot run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Base URL of the Jenkins server.
    #[arg(long, env = "JENKINS_URL", default_value = DEFAULT_SERVICE_URL)]
    pub service_url: String,

    /// Jenkins username.
    #[arg(long, env = "JENKINS_USER", default_value = "admin")]
    pub user: String,

    /// Jenkins API token for basic auth.
    #[arg(long, env = "JENKINS_API_TOKEN")]
    pub api_token: String,

    /// Name of the job to create or update.
    #[arg(long, default_value = DEFAULT_JOB_NAME)]
    pub job_name: String,

    /// Git repository the job builds.
    #[arg(long, default_value = "https://github.com/arya2004/arc")]
    pub repo_url: String,

    /// Branch specifier for the job's SCM config.
    #[arg(long, default_value = "*/master")]
    pub branch_spec: String,

    /// Shell command the job runs.
    #[arg(long, default_value = "dotnet test arc.sln")]
    pub build_command: String,

    /// Tag of the Jenkins image to ensure.
    #[arg(long, default_value = "jenkins-dotnet:latest")]
    pub image_tag: String,

    /// Name of the Jenkins container to ensure.
    #[arg(long, default_value = "jenkins")]
    pub container_name: String,

    /// Seconds to wait for the server to become reachable.
    #[arg(long, default_value = "600")]
    pub readiness_timeout_secs: u64,

    /// Seconds to wait for the triggered build to finish.
    #[arg(long, default_value = "3600")]
    pub build_timeout_secs: u64,

    /// Path the console log is written to, overwritten each run.
    #[arg(short = 'o', long, default_value = "output.txt")]
    pub output: PathBuf,
}

impl RunArgs {
    fn into_config(self) -> PilotConfig {
        PilotConfig {
            service_url: self.service_url,
            user: self.user,
            api_token: self.api_token,
            job_name: self.job_name,
            repo_url: self.repo_url,
            branch_spec: self.branch_spec,
            build_command: self.build_command,
            image_tag: self.image_tag,
            container_name: self.container_name,
            readiness_timeout: Duration::from_secs(self.readiness_timeout_secs),
            build_timeout: Duration::from_secs(self.build_timeout_secs),
            output_path: self.output,
        }
    }
}

/// Parse CLI arguments from the process environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Execute a parsed CLI invocation.
///
/// Exit codes: 0 for completed and soft-stopped runs, 1 when the
/// control-plane session cannot be established or any other fatal error
/// aborts the run.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let config = args.into_config();

            let (cancel_handle, cancel) = cancel_channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current step");
                    cancel_handle.cancel();
                }
            });

            match orchestrator::run(&config, &cancel).await {
                Ok(RunOutcome::Completed {
                    build_number,
                    artifact,
                }) => {
                    info!(
                        build = build_number,
                        path = %artifact.display(),
                        "Run completed"
                    );
                    Ok(())
                }
                Ok(RunOutcome::SoftStopped { reason }) => {
                    info!(%reason, "Run stopped without an artifact");
                    Ok(())
                }
                Err(e) => {
                    match &e {
                        OrchestratorError::Auth(source) => {
                            error!(error = %source, "Could not connect to the control plane, quitting");
                        }
                        other => error!(error = %other, "Run failed"),
                    }
                    std::process::exit(1);
                }
            }
        }
    }
}
