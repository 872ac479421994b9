use crate::commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use job_service::{EngineConfig, PluginRegistry};

/// Execute a serialized job record
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Path to a record produced by `stagehand submit`
    pub record: PathBuf,
}

pub async fn execute(args: ExecArgs, config: &EngineConfig) -> Result<()> {
    if !args.record.exists() {
        color_eyre::eyre::bail!("Job record not found: {}", args.record.display());
    }
    let json = std::fs::read_to_string(&args.record)?;

    let registry = Arc::new(PluginRegistry::with_defaults());
    let outcome = commands::execute_record(json, config, registry).await?;
    if !outcome.success {
        std::process::exit(1);
    }

    Ok(())
}
