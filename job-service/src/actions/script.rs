// Script Action
// Uploads an inline script to the build host and runs it

use crate::actions::parse_args;
use crate::execution::context::ExecutionContext;
use crate::execution::notifier::Notifier;
use crate::expression::interpolate;
use crate::plugins::git_source::shell_quote;
use crate::plugins::{Action, ActionArgs, ActionError, ActionOutcome, Transport};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct ScriptArgs {
    script: String,
    #[serde(default)]
    path: Option<String>,
    /// Where the script is written; defaults to a unique name in the
    /// workspace, or in /tmp when the host has none
    #[serde(default)]
    script_path: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    sudo: bool,
}

/// `action: script`
pub struct ScriptAction {
    args: ScriptArgs,
    prepared: Option<Prepared>,
}

struct Prepared {
    transport: Arc<dyn Transport>,
    script: String,
    script_path: String,
    /// `script_path` with secret values masked, for the log
    display: String,
    /// Generated paths are removed once the script has run
    remove_after: bool,
    path: Option<String>,
    env: BTreeMap<String, String>,
}

impl ScriptAction {
    pub fn from_args(args: &ActionArgs) -> Result<Self, ActionError> {
        Ok(Self {
            args: parse_args("script", args)?,
            prepared: None,
        })
    }
}

#[async_trait::async_trait]
impl Action for ScriptAction {
    fn prepare(&mut self, transport: Arc<dyn Transport>, ctx: &ExecutionContext) -> Result<(), ActionError> {
        let script = interpolate(&self.args.script, ctx)?;
        let script_path = match &self.args.script_path {
            Some(p) => interpolate(p, ctx)?,
            None => {
                let dir = ctx
                    .get_string("workspace")
                    .filter(|w| !w.is_empty())
                    .unwrap_or_else(|| "/tmp".to_string());
                format!(
                    "{}/.stagehand-script-{}.sh",
                    dir.trim_end_matches('/'),
                    uuid::Uuid::new_v4()
                )
            }
        };
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
            script,
            display: ctx.redact(&script_path),
            remove_after: self.args.script_path.is_none(),
            script_path,
            path,
            env,
        });
        Ok(())
    }

    async fn perform(&mut self, log: &mut dyn Notifier) -> Result<ActionOutcome, ActionError> {
        let prepared = self.prepared.as_ref().ok_or(ActionError::NotPrepared)?;
        let transport = &prepared.transport;

        if !prepared.env.is_empty() {
            transport.export_env(&prepared.env).await?;
        }

        transport
            .upload(prepared.script.as_bytes(), &prepared.script_path)
            .await?;

        let quoted = shell_quote(&prepared.script_path);
        let command = if self.args.sudo {
            format!("chmod +x {0} && sudo -E {0}", quoted)
        } else {
            format!("chmod +x {0} && {0}", quoted)
        };

        log.write_line(&format!("$ {}", prepared.display));
        let success = transport.exec(&command, prepared.path.as_deref(), log).await?;
        let exit_code = transport.exit_code().unwrap_or(if success { 0 } else { -1 });

        if prepared.remove_after {
            let cleanup = format!("rm -f {}", quoted);
            if let Err(e) = transport.exec(&cleanup, None, log).await {
                tracing::warn!(path = %prepared.script_path, error = %e, "failed to remove script");
            }
        }

        Ok(ActionOutcome::from_exit(success, exit_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::tracking::{JobRecord, TrackingHandle};
    use crate::execution::LocalNotifier;
    use crate::plugins::{ConnectInfo, LocalTransportPlugin, TransportOptions, TransportPlugin};
    use serde_json::json;

    #[tokio::test]
    async fn test_script_runs_with_interpolation() {
        let temp = tempfile::tempdir().unwrap();
        let info = ConnectInfo {
            host: "localhost".to_string(),
            username: "build".to_string(),
            password: None,
            workdir: Some(temp.path().to_string_lossy().to_string()),
        };
        let transport = LocalTransportPlugin
            .connect(&info, &TransportOptions::default())
            .await
            .unwrap();

        let args = json!({
            "script": "#!/bin/sh\necho building %{job_name}\nexit 4\n",
            "script_path": "%{workspace}/build.sh",
        });
        let mut action = ScriptAction::from_args(args.as_object().unwrap()).unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.insert("job_name", "widget");
        ctx.insert("workspace", temp.path().to_string_lossy().to_string());
        action.prepare(transport, &ctx).unwrap();

        let record = TrackingHandle::new(JobRecord::new("1", "widget", "1"));
        let mut log = LocalNotifier::new(record.clone());
        let outcome = action.perform(&mut log).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, 4);
        assert!(record.snapshot().log.contains("building widget"));
        assert!(temp.path().join("build.sh").exists());
    }

    #[tokio::test]
    async fn test_generated_script_lives_in_workspace_and_is_removed() {
        let temp = tempfile::tempdir().unwrap();
        let info = ConnectInfo {
            host: "localhost".to_string(),
            username: "build".to_string(),
            password: None,
            workdir: Some(temp.path().to_string_lossy().to_string()),
        };
        let transport = LocalTransportPlugin
            .connect(&info, &TransportOptions::default())
            .await
            .unwrap();

        let args = json!({"script": "#!/bin/sh\necho from $(dirname $0)\n"});
        let mut action = ScriptAction::from_args(args.as_object().unwrap()).unwrap();

        let workspace = temp.path().to_string_lossy().to_string();
        let mut ctx = ExecutionContext::new();
        ctx.insert("workspace", workspace.clone());
        action.prepare(transport, &ctx).unwrap();

        let record = TrackingHandle::new(JobRecord::new("1", "widget", "1"));
        let mut log = LocalNotifier::new(record.clone());
        let outcome = action.perform(&mut log).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, 0);
        let logged = record.snapshot().log;
        assert!(logged.contains(&format!("$ {}/.stagehand-script-", workspace)));
        assert!(logged.contains(&format!("from {}", workspace)));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_key_fails_prepare() {
        use crate::plugins::TransportError;

        struct Unused;

        #[async_trait::async_trait]
        impl Transport for Unused {
            async fn exec(
                &self,
                _cmd: &str,
                _path: Option<&str>,
                _log: &mut dyn Notifier,
            ) -> Result<bool, TransportError> {
                Ok(true)
            }

            fn exit_code(&self) -> Option<i32> {
                None
            }

            async fn upload(&self, _data: &[u8], _path: &str) -> Result<(), TransportError> {
                Ok(())
            }

            async fn download(&self, _path: &str) -> Result<Vec<u8>, TransportError> {
                Ok(Vec::new())
            }

            async fn export_env(&self, _env: &BTreeMap<String, String>) -> Result<(), TransportError> {
                Ok(())
            }

            async fn close(&self) -> Result<(), TransportError> {
                Ok(())
            }
        }

        let args = json!({"script": "echo %{missing}"});
        let mut action = ScriptAction::from_args(args.as_object().unwrap()).unwrap();
        let result = action.prepare(Arc::new(Unused), &ExecutionContext::new());
        assert!(matches!(result, Err(ActionError::Interpolation(_))));
    }
}
