// Local Provisioner
// Prepares a local build host: exports environment variables and checks
// that requested packages are already installed

use crate::execution::notifier::Notifier;
use crate::plugins::git_source::shell_quote;
use crate::plugins::{BuildHost, Environment, ProvisionError, Provisioner, Transport};

use serde_json::Value;
use std::collections::BTreeMap;

/// Provisioner for the `local` distro.
///
/// Nothing is installed on the worker machine; `packages` entries must
/// already resolve to commands on the host.
pub struct LocalProvisioner;

#[async_trait::async_trait]
impl Provisioner for LocalProvisioner {
    async fn prepare(
        &self,
        transport: &dyn Transport,
        host: &dyn BuildHost,
        environment: &Environment,
        log: &mut dyn Notifier,
    ) -> Result<(), ProvisionError> {
        log.write_line(&format!("Provisioning {} ({})", host.name(), host.distro()));

        let env = exported_env(environment)?;
        if !env.is_empty() {
            transport.export_env(&env).await?;
        }

        for package in packages(environment)? {
            let lookup = format!("command -v {} >/dev/null 2>&1", shell_quote(&package));
            if !transport.exec(&lookup, None, log).await? {
                return Err(ProvisionError::MissingPackage(package));
            }
            log.write_line(&format!("Found {}", package));
        }

        Ok(())
    }
}

/// The `env` hint as a string map
fn exported_env(environment: &Environment) -> Result<BTreeMap<String, String>, ProvisionError> {
    let mut env = BTreeMap::new();
    match environment.get("env") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Object(_) | Value::Array(_) => {
                        return Err(ProvisionError::InvalidEnvironment(format!(
                            "env.{} must be a scalar",
                            key
                        )))
                    }
                    other => other.to_string(),
                };
                env.insert(key.clone(), value);
            }
        }
        Some(_) => {
            return Err(ProvisionError::InvalidEnvironment(
                "env must be a map".to_string(),
            ))
        }
    }
    Ok(env)
}

/// The `packages` hint as a list of names
fn packages(environment: &Environment) -> Result<Vec<String>, ProvisionError> {
    match environment.get("packages") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ProvisionError::InvalidEnvironment("packages must be strings".to_string())
                })
            })
            .collect(),
        Some(_) => Err(ProvisionError::InvalidEnvironment(
            "packages must be a list".to_string(),
        )),
    }
}
