// Local Builder
// Hands out the worker machine itself as a build host, with a scratch workspace

use crate::plugins::{BuildHost, Builder, BuilderError, ConnectInfo, Environment, Transport};

use serde_json::Value;
use std::collections::BTreeMap;
use tempfile::TempDir;

/// Builder whose hosts are temporary workspaces on this machine
#[derive(Debug, Default)]
pub struct LocalBuilder;

impl LocalBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Builder for LocalBuilder {
    async fn get(&self, environment: &Environment) -> Result<Box<dyn BuildHost>, BuilderError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("stagehand-");

        let workspace = match environment.get("workspace_root").and_then(Value::as_str) {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let username = std::env::var("USER").unwrap_or_else(|_| "stagehand".to_string());
        tracing::info!(workspace = %workspace.path().display(), "acquired local build host");

        Ok(Box::new(LocalBuildHost {
            workspace,
            username,
        }))
    }

    async fn release(
        &self,
        _transport: Option<&dyn Transport>,
        host: Box<dyn BuildHost>,
    ) -> Result<(), BuilderError> {
        // Dropping the host removes its workspace directory.
        tracing::info!(host = host.name(), "released local build host");
        drop(host);
        Ok(())
    }
}

/// The local machine, working inside a temporary directory
#[derive(Debug)]
pub struct LocalBuildHost {
    workspace: TempDir,
    username: String,
}

impl LocalBuildHost {
    pub fn workspace(&self) -> String {
        self.workspace.path().to_string_lossy().to_string()
    }
}

impl BuildHost for LocalBuildHost {
    fn name(&self) -> &str {
        "localhost"
    }

    fn connect_info(&self) -> ConnectInfo {
        ConnectInfo {
            host: self.name().to_string(),
            username: self.username.clone(),
            password: None,
            workdir: Some(self.workspace()),
        }
    }

    fn transports(&self) -> Vec<String> {
        vec!["local".to_string()]
    }

    fn distro(&self) -> &str {
        "local"
    }

    fn context_info(&self) -> BTreeMap<String, Value> {
        let mut info = BTreeMap::new();
        info.insert("host".to_string(), Value::String(self.name().to_string()));
        info.insert("username".to_string(), Value::String(self.username.clone()));
        info.insert("workspace".to_string(), Value::String(self.workspace()));
        info.insert("distro".to_string(), Value::String(self.distro().to_string()));
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_workspace_lifecycle() {
        let builder = LocalBuilder::new();
        let host = builder.get(&Environment::new()).await.unwrap();

        let workspace = PathBuf::from(host.connect_info().workdir.unwrap());
        assert!(workspace.is_dir());
        assert_eq!(host.transports(), vec!["local".to_string()]);
        assert_eq!(
            host.context_info().get("workspace"),
            Some(&Value::String(workspace.to_string_lossy().to_string()))
        );

        builder.release(None, host).await.unwrap();
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn test_workspace_root_hint() {
        let root = tempfile::tempdir().unwrap();
        let mut environment = Environment::new();
        environment.insert(
            "workspace_root".to_string(),
            Value::String(root.path().to_string_lossy().to_string()),
        );

        let host = LocalBuilder::new().get(&environment).await.unwrap();
        let workspace = PathBuf::from(host.connect_info().workdir.unwrap());
        assert!(workspace.starts_with(root.path()));
    }
}
