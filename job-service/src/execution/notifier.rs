// Notifier
// Decouples the runner from where status and log updates end up

use crate::execution::log_buffer::{LiveSink, LogBuffer};
use crate::execution::status::JobStatus;
use crate::execution::tracking::TrackingHandle;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Status/log reporting used by the runner and by every action.
///
/// Implementations persist the change and then tell the job's callback, if
/// any. None of these methods fail: reporting problems are logged by the
/// implementation and never abort a run.
pub trait Notifier: Send {
    fn set_status(&mut self, status: JobStatus);
    fn set_ended(&mut self, ended: DateTime<Utc>);
    fn completion(&mut self, success: bool);
    fn write(&mut self, data: &str);

    /// Convenience for a single line of output
    fn write_line(&mut self, line: &str) {
        self.write(&format!("{}\n", line));
    }
}

#[derive(Debug, Error)]
#[error("callback failed: {0}")]
pub struct CallbackError(pub String);

/// Hooks supplied by the job originator, e.g. a commit-status poster
pub trait Callback: Send {
    fn status_changed(&mut self, _job_id: &str, _status: JobStatus) -> Result<(), CallbackError> {
        Ok(())
    }

    fn completion(&mut self, _job_id: &str, _success: bool) -> Result<(), CallbackError> {
        Ok(())
    }

    fn log_write(&mut self, _job_id: &str, _data: &str) -> Result<(), CallbackError> {
        Ok(())
    }
}

/// Notifier that updates an in-process tracking record
pub struct LocalNotifier {
    job_id: String,
    record: TrackingHandle,
    log: LogBuffer,
    callback: Option<Box<dyn Callback>>,
}

impl LocalNotifier {
    pub fn new(record: TrackingHandle) -> Self {
        Self {
            job_id: record.id(),
            log: LogBuffer::new().with_record(record.clone()),
            record,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: Box<dyn Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Stream raw output to a live consumer as well as the record
    pub fn with_live_sink(mut self, sink: LiveSink) -> Self {
        self.log = LogBuffer::new()
            .with_record(self.record.clone())
            .with_sink(sink);
        self
    }

    pub fn record(&self) -> &TrackingHandle {
        &self.record
    }

    fn notify<F>(&mut self, what: &str, f: F)
    where
        F: FnOnce(&mut dyn Callback, &str) -> Result<(), CallbackError>,
    {
        if let Some(callback) = self.callback.as_deref_mut() {
            if let Err(e) = f(callback, &self.job_id) {
                tracing::warn!(job_id = %self.job_id, hook = what, error = %e, "callback error ignored");
            }
        }
    }
}

impl Notifier for LocalNotifier {
    fn set_status(&mut self, status: JobStatus) {
        self.record.update(|job| job.status = status);
        self.notify("status_changed", |cb, id| cb.status_changed(id, status));
    }

    fn set_ended(&mut self, ended: DateTime<Utc>) {
        self.record.update(|job| job.ended = Some(ended));
    }

    fn completion(&mut self, success: bool) {
        self.record.update(|job| job.success = Some(success));
        self.notify("completion", |cb, id| cb.completion(id, success));
    }

    fn write(&mut self, data: &str) {
        self.log.write(data);
        self.notify("log_write", |cb, id| cb.log_write(id, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::tracking::JobRecord;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recorded {
        statuses: Arc<Mutex<Vec<JobStatus>>>,
        completions: Arc<Mutex<Vec<bool>>>,
    }

    impl Callback for Recorded {
        fn status_changed(&mut self, _job_id: &str, status: JobStatus) -> Result<(), CallbackError> {
            self.statuses.lock().unwrap().push(status);
            Ok(())
        }

        fn completion(&mut self, _job_id: &str, success: bool) -> Result<(), CallbackError> {
            self.completions.lock().unwrap().push(success);
            Ok(())
        }
    }

    struct Broken;

    impl Callback for Broken {
        fn log_write(&mut self, _job_id: &str, _data: &str) -> Result<(), CallbackError> {
            Err(CallbackError("unreachable endpoint".to_string()))
        }
    }

    fn record() -> TrackingHandle {
        TrackingHandle::new(JobRecord::new("job-1", "build", "1.0"))
    }

    #[test]
    fn test_local_notifier_persists() {
        let handle = record();
        let mut notifier = LocalNotifier::new(handle.clone());
        notifier.set_status(JobStatus::Waiting);
        notifier.write_line("hello");
        notifier.completion(true);
        notifier.set_ended(Utc::now());

        let job = handle.snapshot();
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.log, "hello\n");
        assert_eq!(job.success, Some(true));
        assert!(job.ended.is_some());
    }

    #[test]
    fn test_callback_receives_updates() {
        let recorded = Recorded::default();
        let mut notifier = LocalNotifier::new(record()).with_callback(Box::new(recorded.clone()));
        notifier.set_status(JobStatus::Waiting);
        notifier.set_status(JobStatus::Started);
        notifier.completion(false);

        assert_eq!(
            *recorded.statuses.lock().unwrap(),
            vec![JobStatus::Waiting, JobStatus::Started]
        );
        assert_eq!(*recorded.completions.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_callback_errors_are_swallowed() {
        let handle = record();
        let mut notifier = LocalNotifier::new(handle.clone()).with_callback(Box::new(Broken));
        notifier.write("still logged");
        assert_eq!(handle.snapshot().log, "still logged");
    }
}
