// Stage Store
// Persisted, organization-scoped stage definitions that jobs reference
// by name and optional version

use crate::job::stage_view::SerializedAction;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read stage store: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stage store: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn default_organization() -> String {
    "default".to_string()
}

fn default_version() -> String {
    crate::job::definition::DEFAULT_STAGE_VERSION.to_string()
}

/// A stored stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageRecord {
    #[serde(default = "default_organization")]
    pub organization: String,
    pub name: String,
    #[serde(
        default = "default_version",
        deserialize_with = "crate::job::definition::version_string"
    )]
    pub version: String,
    #[serde(default)]
    pub steps: Vec<SerializedAction>,
}

/// Finds stored stages for one organization
pub trait StageLookup: Send + Sync {
    /// With no version, the most recently defined matching stage
    fn find(&self, name: &str, version: Option<&str>) -> Result<Option<StageRecord>, StoreError>;
}

/// Stage lookup over records held in creation order
#[derive(Debug, Clone, Default)]
pub struct InMemoryStageStore {
    organization: String,
    records: Vec<StageRecord>,
}

impl InMemoryStageStore {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            records: Vec::new(),
        }
    }

    pub fn insert(&mut self, record: StageRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StageLookup for InMemoryStageStore {
    fn find(&self, name: &str, version: Option<&str>) -> Result<Option<StageRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .rev()
            .filter(|r| r.organization == self.organization && r.name == name)
            .find(|r| version.map_or(true, |v| r.version == v))
            .cloned())
    }
}

/// Stage store loaded from a YAML list of stage records
#[derive(Debug, Clone)]
pub struct FileStageStore {
    inner: InMemoryStageStore,
}

impl FileStageStore {
    pub fn load(path: &Path, organization: &str) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, organization)
    }

    pub fn parse(content: &str, organization: &str) -> Result<Self, StoreError> {
        let records: Vec<StageRecord> = serde_yaml::from_str(content)?;
        let mut inner = InMemoryStageStore::new(organization);
        for record in records {
            inner.insert(record);
        }
        tracing::debug!(organization, stages = inner.len(), "loaded stage store");
        Ok(Self { inner })
    }
}

impl StageLookup for FileStageStore {
    fn find(&self, name: &str, version: Option<&str>) -> Result<Option<StageRecord>, StoreError> {
        self.inner.find(name, version)
    }
}
