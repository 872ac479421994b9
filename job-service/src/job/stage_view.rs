// Stage View
// Per-job copy of a stage: its ordered steps plus the routing and guard
// overrides the job applied to it

use crate::job::definition::StageDefinition;
use crate::job::job_view::JobError;
use crate::job::store::StageRecord;
use crate::plugins::{ActionArgs, PluginRegistry};

use serde::{Deserialize, Serialize};

/// An action as stored in a step: `{action: <kind>, ...args}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedAction {
    #[serde(rename = "action")]
    pub kind: String,

    #[serde(flatten)]
    pub args: ActionArgs,
}

impl SerializedAction {
    pub fn new(kind: impl Into<String>, args: ActionArgs) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub sequence: u32,
    pub action: SerializedAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageView {
    pub name: String,
    pub version: String,
    pub steps: Vec<Step>,

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

impl StageView {
    /// Build a view of an inline stage, checking every action kind
    pub fn from_definition(def: &StageDefinition, registry: &PluginRegistry) -> Result<Self, JobError> {
        Self::build(&def.name, &def.version, &def.steps, registry)
    }

    /// Build a view of a stored stage, checking every action kind
    pub fn from_record(record: &StageRecord, registry: &PluginRegistry) -> Result<Self, JobError> {
        Self::build(&record.name, &record.version, &record.steps, registry)
    }

    fn build(
        name: &str,
        version: &str,
        actions: &[SerializedAction],
        registry: &PluginRegistry,
    ) -> Result<Self, JobError> {
        let mut steps = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            // construct once so unknown kinds and bad arguments fail at submission
            registry.create_action(action).map_err(|source| JobError::Action {
                stage: name.to_string(),
                step: index,
                source,
            })?;
            steps.push(Step {
                sequence: index as u32 + 1,
                action: action.clone(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            steps,
            on_success: None,
            on_failure: None,
            only_if: None,
            not_if: None,
            fail_if: None,
        })
    }

    /// Steps sorted by their sequence number
    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|step| step.sequence);
        steps
    }

    /// JSON blob stored in the hand-off record
    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(value: serde_json::Value) -> SerializedAction {
        serde_json::from_value(value).unwrap()
    }

    fn definition(steps: Vec<SerializedAction>) -> StageDefinition {
        StageDefinition {
            name: "build".to_string(),
            version: "1.0.0".to_string(),
            steps,
        }
    }

    #[test]
    fn test_steps_are_numbered_in_order() {
        let registry = PluginRegistry::with_defaults();
        let def = definition(vec![
            action(json!({"action": "command", "cmd": "make"})),
            action(json!({"action": "log", "message": "done"})),
        ]);
        let view = StageView::from_definition(&def, &registry).unwrap();
        let numbers: Vec<u32> = view.steps.iter().map(|s| s.sequence).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(view.steps[1].action.kind, "log");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let registry = PluginRegistry::with_defaults();
        let def = definition(vec![action(json!({"action": "teleport"}))]);
        let err = StageView::from_definition(&def, &registry).unwrap_err();
        assert!(matches!(err, JobError::Action { step: 0, .. }));
    }

    #[test]
    fn test_blob_shape() {
        let registry = PluginRegistry::with_defaults();
        let def = definition(vec![action(json!({"action": "command", "cmd": "make"}))]);
        let mut view = StageView::from_definition(&def, &registry).unwrap();
        view.on_failure = Some("cleanup".to_string());

        let blob: serde_json::Value = serde_json::from_str(&view.to_blob().unwrap()).unwrap();
        assert_eq!(blob["steps"][0]["sequence"], json!(1));
        assert_eq!(blob["steps"][0]["action"], json!({"action": "command", "cmd": "make"}));
        assert_eq!(blob["on_failure"], json!("cleanup"));
        assert!(blob.get("on_success").is_none());
    }

    #[test]
    fn test_ordered_steps() {
        let view = StageView {
            name: "s".to_string(),
            version: "1".to_string(),
            steps: vec![
                Step {
                    sequence: 2,
                    action: action(json!({"action": "log", "message": "second"})),
                },
                Step {
                    sequence: 1,
                    action: action(json!({"action": "log", "message": "first"})),
                },
            ],
            on_success: None,
            on_failure: None,
            only_if: None,
            not_if: None,
            fail_if: None,
        };
        let ordered = view.ordered_steps();
        assert_eq!(ordered[0].sequence, 1);
        assert_eq!(ordered[1].sequence, 2);
    }
}
