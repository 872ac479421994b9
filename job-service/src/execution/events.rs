// Execution Events
// Progress reporting for a running job

use crate::execution::status::JobStatus;

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while a runner works through a job
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Job status changed
    StatusChanged { job_name: String, status: JobStatus },

    /// Stage execution started
    StageStarted {
        stage_name: String,
        version: String,
        total_steps: usize,
    },

    /// Stage guard prevented execution; routed as a success
    StageSkipped { stage_name: String, reason: String },

    /// Stage execution completed
    StageCompleted {
        stage_name: String,
        success: bool,
        exit_code: i32,
        duration: Duration,
    },

    /// Step execution started
    StepStarted {
        stage_name: String,
        step_index: usize,
        action: String,
    },

    /// Step execution completed
    StepCompleted {
        stage_name: String,
        step_index: usize,
        success: bool,
        exit_code: i32,
        duration: Duration,
    },

    /// All stages done
    JobCompleted {
        job_name: String,
        success: bool,
        duration: Duration,
    },
}

impl ExecutionEvent {
    /// Create a stage started event
    pub fn stage_started(
        name: impl Into<String>,
        version: impl Into<String>,
        total_steps: usize,
    ) -> Self {
        Self::StageStarted {
            stage_name: name.into(),
            version: version.into(),
            total_steps,
        }
    }

    /// Create a stage skipped event
    pub fn stage_skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StageSkipped {
            stage_name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a stage completed event
    pub fn stage_completed(
        name: impl Into<String>,
        success: bool,
        exit_code: i32,
        duration: Duration,
    ) -> Self {
        Self::StageCompleted {
            stage_name: name.into(),
            success,
            exit_code,
            duration,
        }
    }

    /// Create a step started event
    pub fn step_started(
        stage_name: impl Into<String>,
        step_index: usize,
        action: impl Into<String>,
    ) -> Self {
        Self::StepStarted {
            stage_name: stage_name.into(),
            step_index,
            action: action.into(),
        }
    }

    /// Create a step completed event
    pub fn step_completed(
        stage_name: impl Into<String>,
        step_index: usize,
        success: bool,
        exit_code: i32,
        duration: Duration,
    ) -> Self {
        Self::StepCompleted {
            stage_name: stage_name.into(),
            step_index,
            success,
            exit_code,
            duration,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(ExecutionEvent::stage_started("build", "1.0.0", 2));
        tx.send_event(ExecutionEvent::stage_skipped("deploy", "only_if was false"));

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, ExecutionEvent::StageStarted { total_steps: 2, .. }));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(event2, ExecutionEvent::StageSkipped { .. }));
    }

    #[test]
    fn test_event_construction() {
        let event = ExecutionEvent::step_completed("build", 1, false, 2, Duration::from_secs(3));

        if let ExecutionEvent::StepCompleted {
            stage_name,
            step_index,
            success,
            exit_code,
            duration,
        } = event
        {
            assert_eq!(stage_name, "build");
            assert_eq!(step_index, 1);
            assert!(!success);
            assert_eq!(exit_code, 2);
            assert_eq!(duration, Duration::from_secs(3));
        } else {
            panic!("wrong event type");
        }
    }

    #[test]
    fn test_optional_sender() {
        let sender: Option<ProgressSender> = None;
        // Should not panic
        sender.send_event(ExecutionEvent::stage_skipped("test", "none"));
    }
}
