use crate::commands;
use crate::output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use job_service::{EngineConfig, PluginRegistry};

/// Resolve and execute a job definition on this machine
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the job definition YAML file
    pub job: PathBuf,

    /// Builder to use when the job's environment names none
    #[arg(long, value_name = "NAME")]
    pub builder: Option<String>,

    /// Per-command timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

pub async fn execute(args: RunArgs, config: &EngineConfig) -> Result<()> {
    let mut config = config.clone();
    if let Some(builder) = args.builder {
        config.default_builder = builder;
    }
    if args.timeout.is_some() {
        config.command_timeout_secs = args.timeout;
    }

    let registry = Arc::new(PluginRegistry::with_defaults());

    output::status("Resolving", &format!("{}", args.job.display()));
    let job = commands::resolve(&args.job, &config, &registry)?;
    output::info(&format!(
        "Job '{}': {} stages, sequence {}",
        job.name,
        job.stages.len(),
        job.sequence.join(" -> ")
    ));

    let outcome = commands::execute_record(job.to_json()?, &config, registry).await?;
    output::status("Finished", &format!("{} (exit code {})", outcome.status, outcome.exit_code));
    if !outcome.success {
        std::process::exit(1);
    }

    Ok(())
}
