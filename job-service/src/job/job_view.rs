// Job View
// Resolves a job definition into per-job stage views and an execution
// sequence, and produces the serialized record handed to a runner

use crate::job::definition::{JobDefinition, SequenceEntry, SourceSpec};
use crate::job::stage_view::StageView;
use crate::job::store::{StageLookup, StoreError};
use crate::plugins::{ActionError, Environment, PluginRegistry};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("sequence entry {index} has no stage name")]
    MissingStageName { index: usize },

    #[error("stage not found: {name} (version {})", .version.as_deref().unwrap_or("latest"))]
    StageNotFound {
        name: String,
        version: Option<String>,
    },

    #[error("stage '{stage}' step {step}: {source}")]
    Action {
        stage: String,
        step: usize,
        #[source]
        source: ActionError,
    },

    #[error(transparent)]
    Lookup(#[from] StoreError),

    #[error("invalid job record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid job definition: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A resolved job, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub id: String,
    pub name: String,
    pub version: String,
    pub environment: Environment,
    pub sources: Vec<SourceSpec>,
    pub secrets: BTreeMap<String, String>,
    pub stages: BTreeMap<String, StageView>,
    pub sequence: Vec<String>,
}

impl JobView {
    /// Resolve `def` against inline stages first, then `lookup`.
    ///
    /// The sequence is walked as a worklist: routing targets that are not
    /// yet scheduled are appended and resolved in turn, and an entry
    /// without `on_success` falls through to the entry after it.
    pub fn resolve(
        def: &JobDefinition,
        lookup: &dyn StageLookup,
        registry: &PluginRegistry,
    ) -> Result<Self, JobError> {
        let mut stages = BTreeMap::new();
        for stage in &def.stages {
            let view = StageView::from_definition(stage, registry)?;
            stages.insert(view.name.clone(), view);
        }

        let mut worklist: Vec<SequenceEntry> = def.sequence.clone();
        let mut sequence = Vec::with_capacity(worklist.len());
        let mut index = 0;

        while index < worklist.len() {
            let entry = worklist[index].clone();
            let name = entry
                .stage
                .clone()
                .ok_or(JobError::MissingStageName { index })?;

            let mut view = match stages.get(&name) {
                Some(view) => view.clone(),
                None => {
                    let record = lookup.find(&name, entry.version.as_deref())?.ok_or_else(|| {
                        JobError::StageNotFound {
                            name: name.clone(),
                            version: entry.version.clone(),
                        }
                    })?;
                    StageView::from_record(&record, registry)?
                }
            };

            for target in [&entry.on_success, &entry.on_failure].into_iter().flatten() {
                let scheduled = worklist
                    .iter()
                    .any(|e| e.stage.as_deref() == Some(target.as_str()));
                if !scheduled {
                    worklist.push(SequenceEntry::for_stage(target.clone()));
                }
            }

            view.on_success = entry
                .on_success
                .clone()
                .or_else(|| worklist.get(index + 1).and_then(|next| next.stage.clone()));
            if entry.on_failure.is_some() {
                view.on_failure = entry.on_failure.clone();
            }
            if entry.only_if.is_some() {
                view.only_if = entry.only_if.clone();
            }
            if entry.not_if.is_some() {
                view.not_if = entry.not_if.clone();
            }
            if entry.fail_if.is_some() {
                view.fail_if = entry.fail_if.clone();
            }

            tracing::debug!(
                stage = %name,
                version = %view.version,
                on_success = ?view.on_success,
                on_failure = ?view.on_failure,
                "resolved stage"
            );
            stages.insert(name.clone(), view);
            sequence.push(name);
            index += 1;
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: def.name.clone(),
            version: def.version.clone(),
            environment: def.environment.clone(),
            sources: def.sources.clone(),
            secrets: def.secrets.clone(),
            stages,
            sequence,
        })
    }

    pub fn serialize(&self) -> Result<SerializedJob, JobError> {
        let mut stages = BTreeMap::new();
        for (name, view) in &self.stages {
            stages.insert(name.clone(), view.to_blob()?);
        }
        Ok(SerializedJob {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            environment: self.environment.clone(),
            sources: self.sources.clone(),
            secrets: self.secrets.clone(),
            stages,
            sequence: self.sequence.clone(),
        })
    }

    pub fn from_serialized(job: &SerializedJob) -> Result<Self, JobError> {
        let mut stages = BTreeMap::new();
        for name in job.stages.keys() {
            if let Some(view) = job.stage(name)? {
                stages.insert(name.clone(), view);
            }
        }
        Ok(Self {
            id: job.id.clone(),
            name: job.name.clone(),
            version: job.version.clone(),
            environment: job.environment.clone(),
            sources: job.sources.clone(),
            secrets: job.secrets.clone(),
            stages,
            sequence: job.sequence.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String, JobError> {
        self.serialize()?.to_json()
    }
}

/// The hand-off record a runner is built from. Stage views travel as JSON
/// strings so a worker only decodes the stages it reaches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedJob {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    #[serde(default)]
    pub stages: BTreeMap<String, String>,
    #[serde(default)]
    pub sequence: Vec<String>,
}

impl SerializedJob {
    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Decode one stage blob
    pub fn stage(&self, name: &str) -> Result<Option<StageView>, JobError> {
        self.stages
            .get(name)
            .map(|blob| StageView::from_blob(blob))
            .transpose()
            .map_err(JobError::from)
    }
}
