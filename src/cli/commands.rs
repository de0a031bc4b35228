//! CLI command definitions for mlpipe.
//!
//! Each command builds a platform client from the environment (optionally
//! seeded from an env file) and hands off to the pipeline orchestrator.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::{load_env_file, PlatformConfig};
use crate::pipeline::{PipelineConfig, PipelineOrchestrator, PipelineReport};
use crate::platform::{InferenceRequest, PlatformClient};

/// End-to-end ML pipeline orchestration on a managed MLOps platform.
#[derive(Parser)]
#[command(name = "mlpipe")]
#[command(about = "Run an end-to-end ML pipeline on a managed MLOps platform")]
#[command(version)]
#[command(
    long_about = "mlpipe sequences remote platform jobs into a complete pipeline:\n\
data generation, exploratory description, training, hyperparameter search,\n\
model serving, and a platform-native workflow.\n\n\
Example usage:\n  mlpipe run --env-file remote.env --project breast-cancer"
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
    /// Run the full pipeline: generate, describe, train, sweep, serve,
    /// and submit the workflow.
    Run(RunArgs),

    /// Run the training portion only: generate, describe, train, sweep,
    /// and list the resulting models.
    Train(TrainArgs),

    /// Deploy the serving function against an existing model artifact and
    /// post a sample inference.
    Deploy(DeployArgs),

    /// Submit the workflow definition alone.
    Workflow(WorkflowArgs),
}

/// Arguments shared by all commands for reaching the platform.
#[derive(Parser, Debug)]
pub struct ConnectArgs {
    /// Env file with platform credentials and endpoints (e.g. remote.env).
    #[arg(short, long)]
    pub env_file: Option<String>,

    /// Project namespace on the platform.
    #[arg(short, long, env = "MLPIPE_PROJECT")]
    pub project: Option<String>,

    /// Container image for the pipeline functions.
    #[arg(short, long, env = "MLPIPE_IMAGE")]
    pub image: Option<String>,

    /// Output the stage report as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `mlpipe run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Skip the workflow stage.
    #[arg(long)]
    pub no_workflow: bool,
}

/// Arguments for `mlpipe train`.
#[derive(Parser, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

/// Arguments for `mlpipe deploy`.
#[derive(Parser, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Store path of the model artifact to serve.
    #[arg(short, long)]
    pub model_path: String,

    /// JSON file with an {"inputs": [[...]]} batch to post instead of the
    /// bundled sample.
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for `mlpipe workflow`.
#[derive(Parser, Debug)]
pub struct WorkflowArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Workflow definition path, overriding the configured default.
    #[arg(short, long)]
    pub workflow_path: Option<String>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with pre-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Train(args) => run_training(args).await,
        Commands::Deploy(args) => run_deploy(args).await,
        Commands::Workflow(args) => run_workflow(args).await,
    }
}

/// Builds the platform client and pipeline config from the environment
/// plus shared CLI overrides.
fn build_context(connect: &ConnectArgs) -> anyhow::Result<(PlatformClient, PipelineConfig)> {
    if let Some(env_file) = &connect.env_file {
        load_env_file(env_file).with_context(|| format!("loading env file '{}'", env_file))?;
        info!(env_file = %env_file, "Loaded platform environment");
    }

    let platform = PlatformConfig::from_env().context("reading platform configuration")?;
    let client = PlatformClient::new(platform);
    info!(
        api_base = client.api_base(),
        api_key = %client.api_key_masked(),
        "Connected platform client"
    );

    let mut config = PipelineConfig::from_env().context("reading pipeline configuration")?;
    if let Some(project) = &connect.project {
        config = config.with_project(project);
    }
    if let Some(image) = &connect.image {
        config = config.with_image(image);
    }

    Ok((client, config))
}

/// Prints the stage report, honoring `--json`.
fn emit_report(report: &PipelineReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json_pretty()?);
        return Ok(());
    }

    println!("Pipeline '{}' finished:", report.project);
    for stage in &report.stages {
        match &stage.run_uid {
            Some(uid) => println!(
                "  {:<22} {:<10} {:>8}ms  run={}",
                stage.stage, stage.state, stage.duration_ms, uid
            ),
            None => println!(
                "  {:<22} {:<10} {:>8}ms",
                stage.stage, stage.state, stage.duration_ms
            ),
        }
    }
    Ok(())
}

async fn run_pipeline(args: RunArgs) -> anyhow::Result<()> {
    let (client, mut config) = build_context(&args.connect)?;
    if args.no_workflow {
        config = config.skip_workflow();
    }

    let orchestrator = PipelineOrchestrator::new(client, config)?;
    let report = orchestrator.run().await?;
    emit_report(&report, args.connect.json)
}

async fn run_training(args: TrainArgs) -> anyhow::Result<()> {
    let (client, config) = build_context(&args.connect)?;
    let orchestrator = PipelineOrchestrator::new(client, config)?;
    let report = orchestrator.run_training().await?;
    emit_report(&report, args.connect.json)
}

async fn run_deploy(args: DeployArgs) -> anyhow::Result<()> {
    let (client, config) = build_context(&args.connect)?;
    let orchestrator = PipelineOrchestrator::new(client, config)?;

    let inputs = match &args.input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading input file '{}'", path))?;
            let request: InferenceRequest = serde_json::from_str(&text)
                .with_context(|| format!("parsing input file '{}'", path))?;
            Some(request)
        }
        None => None,
    };

    let report = orchestrator.run_serving(&args.model_path, inputs).await?;
    emit_report(&report, args.connect.json)
}

async fn run_workflow(args: WorkflowArgs) -> anyhow::Result<()> {
    let (client, mut config) = build_context(&args.connect)?;
    if let Some(path) = &args.workflow_path {
        config.workflow_path = path.clone();
    }

    let orchestrator = PipelineOrchestrator::new(client, config)?;
    let report = orchestrator.run_workflow_only().await?;
    emit_report(&report, args.connect.json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from([
            "mlpipe",
            "run",
            "--env-file",
            "remote.env",
            "--project",
            "demo",
            "--no-workflow",
            "--json",
        ])
        .expect("parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.connect.env_file.as_deref(), Some("remote.env"));
                assert_eq!(args.connect.project.as_deref(), Some("demo"));
                assert!(args.no_workflow);
                assert!(args.connect.json);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_deploy_requires_model_path() {
        assert!(Cli::try_parse_from(["mlpipe", "deploy"]).is_err());

        let cli = Cli::try_parse_from(["mlpipe", "deploy", "--model-path", "v3io://m"])
            .expect("parse");
        match cli.command {
            Commands::Deploy(args) => {
                assert_eq!(args.model_path, "v3io://m");
                assert!(args.input.is_none());
            }
            _ => panic!("expected deploy command"),
        }
    }

    #[test]
    fn test_parse_global_log_level() {
        let cli = Cli::try_parse_from(["mlpipe", "workflow", "--log-level", "debug"])
            .expect("parse");
        assert_eq!(cli.log_level, "debug");
    }
}
