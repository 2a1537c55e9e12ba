//! Inference stack bootstrap CLI.
//!
//! Provisions the cluster, waits for GitOps to bring up the model server,
//! and connects a Konnect Dedicated Cloud Gateway to it over a transit
//! gateway.

#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use inference_bootstrap::commands::render::RenderCommand;
use inference_bootstrap::commands::run::RunCommand;
use inference_bootstrap::commands::status::StatusCommand;

/// Private inference gateway bootstrap.
#[derive(Parser)]
#[command(
    name = "inference-bootstrap",
    version,
    about = "Bootstrap a private Ollama deployment behind a Konnect cloud gateway",
    long_about = "Bootstrap a private Ollama deployment behind a Konnect cloud gateway.\n\n\
                  Applies the infrastructure, waits for Argo CD to bring up the model\n\
                  server, then creates the Konnect control plane, network and transit\n\
                  gateway attachment and syncs the gateway configuration.\n\n\
                  Every run re-checks every stage - re-running the same command after\n\
                  a failure adopts what already exists."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Bring the whole stack up.
    ///
    /// Stages run in order; remote resources are created or adopted by name.
    Run(RunCommand),

    /// Show the record of the last run.
    Status(StatusCommand),

    /// Substitute the gateway endpoint into the decK document without syncing.
    Render(RenderCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info,inference_bootstrap=debug,konnect=debug")
    } else {
        EnvFilter::new("warn,inference_bootstrap=info,konnect=info")
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    match cli.command {
        Commands::Run(cmd) => cmd.run().await,
        Commands::Status(cmd) => cmd.run().await,
        Commands::Render(cmd) => cmd.run().await,
    }
}
