// Job Module
// Job definitions, stage views, stage storage and sequence resolution

pub mod definition;
pub mod job_view;
pub mod stage_view;
pub mod store;

pub use definition::{JobDefinition, SequenceEntry, SourceSpec, StageDefinition, DEFAULT_STAGE_VERSION};
pub use job_view::{JobError, JobView, SerializedJob};
pub use stage_view::{SerializedAction, StageView, Step};
pub use store::{FileStageStore, InMemoryStageStore, StageLookup, StageRecord, StoreError};
