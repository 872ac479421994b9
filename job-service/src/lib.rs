// Job Service Library
// Resolves declarative job definitions and runs them on build hosts

pub mod actions;
pub mod config;
pub mod error;
pub mod execution;
pub mod expression;
pub mod job;
pub mod plugins;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use error::{ServiceError, ServiceResult};

// Re-export expression types
pub use expression::{EvalError, Evaluator};

// Re-export job types
pub use job::{
    FileStageStore, InMemoryStageStore, JobDefinition, JobError, JobView, SerializedJob,
    StageLookup, StageView,
};

// Re-export execution types
pub use execution::{
    Callback, ExecutionContext, ExecutionEvent, JobRecord, JobStatus, LocalNotifier, Notifier,
    ProgressSender, RunOutcome, Runner, RunnerError, RunnerOptions, TrackingHandle, TrackingStore,
};

// Re-export plugin types
pub use plugins::{Action, ActionOutcome, PluginKind, PluginRegistry};
