use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use provisioner_core::ProcessOutcome;
use provisioner_worker::config::{LogFormat, WorkerConfig};
use provisioner_worker::worker::{run_stream, seeded_provisioner};
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "AZP_PROVISIONER_LOG";

/// AZP provisioner: creates Azure DevOps projects and repositories from tickets
#[derive(Parser)]
#[command(name = "azp-provisioner")]
#[command(about = "Provision Azure DevOps projects and repositories from tickets", long_about = None)]
struct Cli {
    /// Configuration file. Defaults to ./azp-provisioner.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process newline-delimited messages from standard input
    Run,

    /// Process a single message file
    Process {
        /// File holding the raw message
        file: PathBuf,
    },

    /// Print the identifier the next project would receive
    NextId,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout carries command output.
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error_message = %e, "Failed to listen for CTRL+C");
        std::future::pending::<()>().await;
    }
    info!("Received CTRL+C, initiating graceful shutdown");
}

async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    let provisioner = Arc::new(seeded_provisioner(&config).await?);

    info!(
        organization = %config.organization,
        concurrency = config.worker.concurrency,
        "Worker started, reading messages from stdin"
    );
    let summary = run_stream(
        provisioner,
        BufReader::new(tokio::io::stdin()),
        config.worker.concurrency,
        shutdown_signal(),
    )
    .await?;

    info!(processed = summary.total(), "Worker stopped");
    Ok(())
}

async fn process(config: WorkerConfig, file: PathBuf) -> anyhow::Result<bool> {
    let raw = tokio::fs::read(&file)
        .await
        .with_context(|| format!("failed to read message file {:?}", file))?;

    let provisioner = seeded_provisioner(&config).await?;

    let outcome = provisioner.handle_message(&raw).await;
    match &outcome {
        ProcessOutcome::Provisioned { kind, name, .. } => {
            println!("Provisioned {} {}", kind, name);
        }
        ProcessOutcome::DeadLettered { reason, .. } => {
            println!("Dead-lettered: {}", reason);
        }
    }
    Ok(outcome.is_success())
}

async fn next_id(config: WorkerConfig) -> anyhow::Result<()> {
    let provisioner = seeded_provisioner(&config).await?;

    println!("{}", provisioner.allocator().peek_next()?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = WorkerConfig::load(cli.config.as_deref())?;
    init_logging(config.worker.log_format);

    let result = match cli.command {
        Commands::Run => run(config).await,
        Commands::Process { file } => {
            if !process(config, file).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::NextId => next_id(config).await,
    };

    if let Err(e) = &result {
        error!("Error: {e:#}");
    }
    result
}
