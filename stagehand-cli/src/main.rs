mod commands;
mod output;
mod telemetry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use job_service::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(author, version, about = "Resolve and run declarative CI jobs")]
struct Cli {
    /// Engine configuration file (default: ./stagehand.toml when present)
    #[arg(long, global = true, env = "STAGEHAND_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that a job definition resolves
    Validate(commands::validate::ValidateArgs),
    /// Resolve a job definition into a serialized job record
    Submit(commands::submit::SubmitArgs),
    /// Execute a serialized job record
    Exec(commands::exec::ExecArgs),
    /// Resolve and execute a job definition
    Run(commands::run::RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;
    telemetry::init_tracing(cli.log_json || config.log_json, &config.log_level);
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, &config),
        Commands::Submit(args) => commands::submit::execute(args, &config),
        Commands::Exec(args) => commands::exec::execute(args, &config).await,
        Commands::Run(args) => commands::run::execute(args, &config).await,
    }
}
