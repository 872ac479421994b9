use crate::commands;
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use job_service::{EngineConfig, PluginRegistry};

/// Check that a job definition resolves
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the job definition YAML file
    pub job: PathBuf,
}

pub fn execute(args: ValidateArgs, config: &EngineConfig) -> Result<()> {
    output::status("Validating", &format!("{}", args.job.display()));

    let def = commands::load_definition(&args.job)?;
    output::check(&format!(
        "Definition parsed: {} inline stages, {} sequence entries",
        def.stages.len(),
        def.sequence.len()
    ));

    let registry = PluginRegistry::with_defaults();
    let lookup = commands::stage_lookup(config)?;
    let job = match job_service::JobView::resolve(&def, lookup.as_ref(), &registry) {
        Ok(job) => job,
        Err(e) => {
            output::error(&format!("Resolution failed: {}", e));
            std::process::exit(1);
        }
    };

    for name in &job.sequence {
        if let Some(stage) = job.stages.get(name) {
            let route = |target: &Option<String>| target.as_deref().unwrap_or("-").to_string();
            output::check(&format!(
                "{} {} ({} steps) -> success: {}, failure: {}",
                stage.name,
                stage.version,
                stage.steps.len(),
                route(&stage.on_success),
                route(&stage.on_failure)
            ));
        }
    }

    println!();
    output::success("Job definition is valid");

    Ok(())
}
