// Job Status
// Lifecycle of a single job execution attempt

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a job run.
///
/// Variants are declared in lifecycle order, so the derived ordering doubles
/// as the monotonic transition rule: a job only ever moves to a status that
/// compares greater than its current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Submitted, no worker has picked it up
    New,
    /// Waiting for a build host
    Waiting,
    /// Stage execution underway
    Started,
    /// A stage failed; failure handlers may still be running
    Failing,
    /// Finished unsuccessfully
    Failed,
    /// Finished successfully
    Succeeded,
}

impl JobStatus {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Succeeded)
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            // Both terminal states are reachable from any live state.
            JobStatus::Failed | JobStatus::Succeeded => true,
            _ => next > *self,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "NEW",
            JobStatus::Waiting => "WAITING",
            JobStatus::Started => "STARTED",
            JobStatus::Failing => "FAILING",
            JobStatus::Failed => "FAILED",
            JobStatus::Succeeded => "SUCCEEDED",
        }
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::New
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
