pub mod exec;
pub mod run;
pub mod submit;
pub mod validate;

use crate::output;

use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;

use job_service::execution::progress_channel;
use job_service::{
    EngineConfig, ExecutionEvent, FileStageStore, InMemoryStageStore, JobDefinition, JobRecord,
    JobView, LocalNotifier, PluginRegistry, RunOutcome, Runner, SerializedJob, StageLookup,
    TrackingHandle,
};

/// Read a YAML (or JSON) job definition
pub fn load_definition(path: &Path) -> Result<JobDefinition> {
    if !path.exists() {
        bail!("Job definition not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)?;
    JobDefinition::from_yaml(&content).map_err(|e| eyre!("Invalid job definition: {}", e))
}

/// Stored stages for the configured organization
pub fn stage_lookup(config: &EngineConfig) -> Result<Box<dyn StageLookup>> {
    match &config.stages_file {
        Some(path) => Ok(Box::new(FileStageStore::load(path, &config.organization)?)),
        None => Ok(Box::new(InMemoryStageStore::new(config.organization.clone()))),
    }
}

pub fn resolve(path: &Path, config: &EngineConfig, registry: &PluginRegistry) -> Result<JobView> {
    let def = load_definition(path)?;
    let lookup = stage_lookup(config)?;
    Ok(JobView::resolve(&def, lookup.as_ref(), registry)?)
}

/// Run a serialized job on this machine, streaming output and progress
pub async fn execute_record(
    job_json: String,
    config: &EngineConfig,
    registry: Arc<PluginRegistry>,
) -> Result<RunOutcome> {
    let job = SerializedJob::from_json(&job_json)?;
    let record = TrackingHandle::new(JobRecord::new(&job.id, &job.name, &job.version));

    let (log_tx, mut log_rx) = tokio::sync::mpsc::unbounded_channel();
    let (progress_tx, mut progress_rx) = progress_channel();

    let notifier = LocalNotifier::new(record).with_live_sink(log_tx);
    let mut options = config.runner_options();
    options.progress = Some(progress_tx);

    output::job_banner(&job.name, &job.version, &job.id);

    // Spawn execution in background
    let exec_handle = tokio::spawn(async move {
        let runner = Runner::new(&job_json, Box::new(notifier), registry, options).await?;
        runner.run().await
    });

    // Process output and events in the foreground
    loop {
        tokio::select! {
            Some(chunk) = log_rx.recv() => {
                for line in chunk.lines() {
                    output::log_line(line);
                }
            }
            Some(event) = progress_rx.recv() => render_event(&event),
            else => break,
        }
    }

    Ok(exec_handle.await??)
}

fn render_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::StatusChanged { status, .. } => {
            output::status("Status", status.as_str());
        }

        ExecutionEvent::StageStarted {
            stage_name,
            version,
            total_steps,
        } => output::stage_header(stage_name, version, *total_steps),

        ExecutionEvent::StageSkipped { stage_name, reason } => {
            output::warning(&format!("  Stage '{}' skipped: {}", stage_name, reason));
        }

        ExecutionEvent::StageCompleted {
            stage_name,
            success,
            exit_code,
            duration,
        } => {
            let line = format!(
                "  Stage '{}' {} (exit {}, {:.2}s)",
                stage_name,
                if *success { "OK" } else { "FAIL" },
                exit_code,
                duration.as_secs_f64()
            );
            output::stage_summary(&line, *success);
        }

        ExecutionEvent::StepStarted {
            step_index, action, ..
        } => {
            eprintln!("      [Step {}] {}", step_index + 1, action);
        }

        ExecutionEvent::StepCompleted { .. } => {}

        ExecutionEvent::JobCompleted {
            job_name,
            success,
            duration,
        } => {
            println!();
            if *success {
                output::success(&format!(
                    "Job '{}' succeeded in {:.2}s",
                    job_name,
                    duration.as_secs_f64()
                ));
            } else {
                output::failure(&format!(
                    "Job '{}' failed after {:.2}s",
                    job_name,
                    duration.as_secs_f64()
                ));
            }
        }
    }
}
