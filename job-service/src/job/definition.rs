// Job Definition
// The user-authored description of a job, parsed from YAML or JSON

use crate::job::stage_view::SerializedAction;
use crate::plugins::Environment;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Version used for stages that do not declare one
pub const DEFAULT_STAGE_VERSION: &str = "1.0.0";

fn default_stage_version() -> String {
    DEFAULT_STAGE_VERSION.to_string()
}

/// A job as submitted: provisioning hints, sources, stages and the order
/// to run them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_stage_version", deserialize_with = "version_string")]
    pub version: String,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub sources: Vec<SourceSpec>,

    #[serde(default)]
    pub secrets: BTreeMap<String, String>,

    /// Stages defined inline for this job only
    #[serde(default)]
    pub stages: Vec<StageDefinition>,

    #[serde(default)]
    pub sequence: Vec<SequenceEntry>,
}

impl JobDefinition {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// A source to check out before the first stage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Plugin-specific fields such as `path`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An inline stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageDefinition {
    pub name: String,

    #[serde(default = "default_stage_version", deserialize_with = "version_string")]
    pub version: String,

    #[serde(default)]
    pub steps: Vec<SerializedAction>,
}

/// One entry of a job's `sequence`.
///
/// `stage` is optional here so a missing name surfaces as a resolution
/// error that points at the entry instead of a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SequenceEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(
        default,
        deserialize_with = "optional_version_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_if: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_if: Option<String>,
}

impl SequenceEntry {
    pub fn for_stage(name: impl Into<String>) -> Self {
        Self {
            stage: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Versions may be written as `1.0.0`, `2` or `1.5`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<RawVersion> for String {
    fn from(raw: RawVersion) -> Self {
        match raw {
            RawVersion::Text(s) => s,
            RawVersion::Integer(n) => n.to_string(),
            RawVersion::Float(f) => f.to_string(),
        }
    }
}

pub(crate) fn version_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawVersion::deserialize(deserializer).map(String::from)
}

fn optional_version_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawVersion>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_definition() {
        let yaml = r#"
name: widget
version: 3
environment:
  builder: local
  packages: [git]
sources:
  - type: git
    url: https://github.com/acme/widget.git
    branch: main
    path: src
secrets:
  api_token: hunter2
stages:
  - name: build
    steps:
      - action: command
        cmd: make
sequence:
  - stage: build
    on_failure: notify
  - stage: notify
    version: 1.5
"#;
        let job = JobDefinition::from_yaml(yaml).unwrap();
        assert_eq!(job.name, "widget");
        assert_eq!(job.version, "3");
        assert_eq!(job.environment.get("builder"), Some(&Value::from("local")));
        assert_eq!(job.sources[0].kind, "git");
        assert_eq!(job.sources[0].extra.get("path"), Some(&Value::from("src")));
        assert_eq!(job.secrets.get("api_token").map(String::as_str), Some("hunter2"));
        assert_eq!(job.stages[0].version, DEFAULT_STAGE_VERSION);
        assert_eq!(job.stages[0].steps[0].kind, "command");
        assert_eq!(job.sequence[0].on_failure.as_deref(), Some("notify"));
        assert_eq!(job.sequence[1].version.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_empty_definition() {
        let job = JobDefinition::from_json("{}").unwrap();
        assert!(job.sequence.is_empty());
        assert_eq!(job.version, DEFAULT_STAGE_VERSION);
    }

    #[test]
    fn test_entry_without_stage_parses() {
        let job = JobDefinition::from_yaml("sequence:\n  - only_if: \"1 == 1\"\n").unwrap();
        assert!(job.sequence[0].stage.is_none());
    }
}
