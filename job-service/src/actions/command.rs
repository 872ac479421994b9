// Command Action
// Runs a single command line on the build host

use crate::actions::parse_args;
use crate::execution::context::ExecutionContext;
use crate::execution::notifier::Notifier;
use crate::expression::interpolate;
use crate::plugins::{Action, ActionArgs, ActionError, ActionOutcome, Transport};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct CommandArgs {
    cmd: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    sudo: bool,
}

/// `action: command`
pub struct CommandAction {
    args: CommandArgs,
    prepared: Option<Prepared>,
}

struct Prepared {
    transport: Arc<dyn Transport>,
    command: String,
    /// `command` with secret values masked, for the log
    display: String,
    path: Option<String>,
    env: BTreeMap<String, String>,
}

impl CommandAction {
    pub fn from_args(args: &ActionArgs) -> Result<Self, ActionError> {
        let args: CommandArgs = parse_args("command", args)?;
        if args.cmd.trim().is_empty() {
            return Err(ActionError::invalid("command", "cmd is empty"));
        }
        Ok(Self {
            args,
            prepared: None,
        })
    }
}

#[async_trait::async_trait]
impl Action for CommandAction {
    fn prepare(&mut self, transport: Arc<dyn Transport>, ctx: &ExecutionContext) -> Result<(), ActionError> {
        let mut parts = vec![interpolate(&self.args.cmd, ctx)?];
        for arg in &self.args.args {
            parts.push(interpolate(arg, ctx)?);
        }
        let mut command = parts.join(" ");
        if self.args.sudo {
            command = format!("sudo -E {}", command);
        }

        let path = self
            .args
            .path
            .as_deref()
            .map(|p| interpolate(p, ctx))
            .transpose()?;

        let mut env = BTreeMap::new();
        for (key, value) in &self.args.env {
            env.insert(key.clone(), interpolate(value, ctx)?);
        }

        self.prepared = Some(Prepared {
            transport,
            display: ctx.redact(&command),
            command,
            path,
            env,
        });
        Ok(())
    }

    async fn perform(&mut self, log: &mut dyn Notifier) -> Result<ActionOutcome, ActionError> {
        let prepared = self.prepared.as_ref().ok_or(ActionError::NotPrepared)?;

        if !prepared.env.is_empty() {
            prepared.transport.export_env(&prepared.env).await?;
        }

        log.write_line(&format!("$ {}", prepared.display));
        let success = prepared
            .transport
            .exec(&prepared.command, prepared.path.as_deref(), log)
            .await?;
        let exit_code = prepared
            .transport
            .exit_code()
            .unwrap_or(if success { 0 } else { -1 });

        Ok(ActionOutcome::from_exit(success, exit_code))
    }
}
