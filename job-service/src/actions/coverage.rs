// Coverage Actions
// Read coverage reports left on the build host and publish the
// percentages into the execution context

use crate::actions::parse_args;
use crate::execution::context::ExecutionContext;
use crate::execution::notifier::Notifier;
use crate::expression::interpolate;
use crate::plugins::{Action, ActionArgs, ActionError, ActionOutcome, Transport};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

static LINE_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"line-rate="([0-9]*\.?[0-9]+)""#).expect("valid regex"));
static BRANCH_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"branch-rate="([0-9]*\.?[0-9]+)""#).expect("valid regex"));

#[derive(Debug, Clone, Deserialize)]
struct ReportArgs {
    path: String,
}

struct Prepared {
    transport: Arc<dyn Transport>,
    path: String,
}

fn prepare_report(
    args: &ReportArgs,
    transport: Arc<dyn Transport>,
    ctx: &ExecutionContext,
) -> Result<Prepared, ActionError> {
    Ok(Prepared {
        transport,
        path: interpolate(&args.path, ctx)?,
    })
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// `action: simplecov`, reads a SimpleCov `.last_run.json`
pub struct SimplecovAction {
    args: ReportArgs,
    prepared: Option<Prepared>,
}

impl SimplecovAction {
    pub fn from_args(args: &ActionArgs) -> Result<Self, ActionError> {
        Ok(Self {
            args: parse_args("simplecov", args)?,
            prepared: None,
        })
    }
}

/// Covered percentage from a `.last_run.json` document
fn simplecov_percent(report: &str) -> Result<f64, ActionError> {
    let doc: Value = serde_json::from_str(report)
        .map_err(|e| ActionError::Report(format!("invalid simplecov report: {}", e)))?;
    let result = doc
        .get("result")
        .ok_or_else(|| ActionError::Report("simplecov report has no result".to_string()))?;
    result
        .get("covered_percent")
        .or_else(|| result.get("line"))
        .and_then(Value::as_f64)
        .ok_or_else(|| ActionError::Report("simplecov report has no coverage value".to_string()))
}

#[async_trait::async_trait]
impl Action for SimplecovAction {
    fn prepare(&mut self, transport: Arc<dyn Transport>, ctx: &ExecutionContext) -> Result<(), ActionError> {
        self.prepared = Some(prepare_report(&self.args, transport, ctx)?);
        Ok(())
    }

    async fn perform(&mut self, log: &mut dyn Notifier) -> Result<ActionOutcome, ActionError> {
        let prepared = self.prepared.as_ref().ok_or(ActionError::NotPrepared)?;
        let data = prepared.transport.download(&prepared.path).await?;
        let covered = simplecov_percent(&String::from_utf8_lossy(&data))?;

        let covered = percent(covered);
        log.write_line(&format!("Coverage: {}", covered));
        Ok(ActionOutcome::from_exit(true, 0).with_context("simplecov_coverage", covered))
    }
}

/// `action: cobertura`, reads a Cobertura XML report
pub struct CoberturaAction {
    args: ReportArgs,
    prepared: Option<Prepared>,
}

impl CoberturaAction {
    pub fn from_args(args: &ActionArgs) -> Result<Self, ActionError> {
        Ok(Self {
            args: parse_args("cobertura", args)?,
            prepared: None,
        })
    }
}

/// Line and branch rates from the report's root element, as fractions
fn cobertura_rates(report: &str) -> Result<(f64, f64), ActionError> {
    let rate = |re: &Regex, name: &str| {
        re.captures(report)
            .and_then(|c| c[1].parse::<f64>().ok())
            .ok_or_else(|| ActionError::Report(format!("cobertura report has no {}", name)))
    };
    Ok((rate(&LINE_RATE, "line-rate")?, rate(&BRANCH_RATE, "branch-rate")?))
}

#[async_trait::async_trait]
impl Action for CoberturaAction {
    fn prepare(&mut self, transport: Arc<dyn Transport>, ctx: &ExecutionContext) -> Result<(), ActionError> {
        self.prepared = Some(prepare_report(&self.args, transport, ctx)?);
        Ok(())
    }

    async fn perform(&mut self, log: &mut dyn Notifier) -> Result<ActionOutcome, ActionError> {
        let prepared = self.prepared.as_ref().ok_or(ActionError::NotPrepared)?;
        let data = prepared.transport.download(&prepared.path).await?;
        let (line, branch) = cobertura_rates(&String::from_utf8_lossy(&data))?;

        let line = percent(line * 100.0);
        let branch = percent(branch * 100.0);
        log.write_line(&format!("Line coverage: {}, branch coverage: {}", line, branch));
        Ok(ActionOutcome::from_exit(true, 0)
            .with_context("cobertura_line_rate", line)
            .with_context("cobertura_branch_rate", branch))
    }
}
