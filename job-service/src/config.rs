// Engine Configuration
// Settings loaded from `stagehand.toml`, with environment overrides

use crate::execution::runner::RunnerOptions;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File read when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "stagehand.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level engine settings. Every field has a default, so an empty or
/// missing file is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Builder used when a job's environment names none
    #[serde(default = "default_builder")]
    pub default_builder: String,

    /// Organization whose stored stages jobs may reference
    #[serde(default = "default_organization")]
    pub organization: String,

    /// YAML file of stored stages
    #[serde(default)]
    pub stages_file: Option<PathBuf>,

    /// Per-command timeout for the local transport
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_builder() -> String {
    "local".to_string()
}

fn default_organization() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_builder: default_builder(),
            organization: default_organization(),
            stages_file: None,
            command_timeout_secs: None,
            log_json: false,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load `path`, or `stagehand.toml` in the current directory when it
    /// exists, then apply `STAGEHAND_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Environment variables take precedence over the file
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(builder) = lookup("STAGEHAND_BUILDER").filter(|v| !v.is_empty()) {
            self.default_builder = builder;
        }
        if let Some(org) = lookup("STAGEHAND_ORGANIZATION").filter(|v| !v.is_empty()) {
            self.organization = org;
        }
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            default_builder: self.default_builder.clone(),
            command_timeout: self.command_timeout(),
            progress: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_values() {
        let config = EngineConfig::default();
        assert_eq!(config.default_builder, "local");
        assert_eq!(config.organization, "default");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert!(config.command_timeout().is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            organization = "acme"
            command_timeout_secs = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.organization, "acme");
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.default_builder, "local");
        assert_eq!(config.runner_options().command_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config.apply_overrides(|key| match key {
            "STAGEHAND_BUILDER" => Some("docker".to_string()),
            "STAGEHAND_ORGANIZATION" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.default_builder, "docker");
        assert_eq!(config.organization, "default");
    }

    #[test]
    fn test_from_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"log_json = \"yes\"").unwrap();
        assert!(matches!(
            EngineConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::from_file(Path::new("/nonexistent/stagehand.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
