use crate::commands;
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use job_service::{EngineConfig, PluginRegistry};

/// Resolve a job definition into a serialized job record
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Path to the job definition YAML file
    pub job: PathBuf,

    /// Write the record here instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty-print the record
    #[arg(long)]
    pub pretty: bool,
}

pub fn execute(args: SubmitArgs, config: &EngineConfig) -> Result<()> {
    let registry = PluginRegistry::with_defaults();
    let job = commands::resolve(&args.job, config, &registry)?;
    let record = if args.pretty {
        serde_json::to_string_pretty(&job.serialize()?)?
    } else {
        job.to_json()?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &record)?;
            output::success(&format!("Job {} written to {}", job.id, path.display()));
        }
        None => println!("{}", record),
    }

    Ok(())
}
