// Execution Module
// Runs serialized jobs and reports their progress

pub mod context;
pub mod events;
pub mod log_buffer;
pub mod notifier;
pub mod runner;
pub mod status;
pub mod tracking;

// Re-export key types
pub use context::ExecutionContext;
pub use events::{progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender};
pub use log_buffer::{LiveSink, LogBuffer, StringFifo};
pub use notifier::{Callback, CallbackError, LocalNotifier, Notifier};
pub use runner::{RunOutcome, Runner, RunnerError, RunnerOptions};
pub use status::JobStatus;
pub use tracking::{JobRecord, TrackingHandle, TrackingStore};
