// Job Tracking
// In-process stand-in for the persistent record a job originator watches

use crate::execution::status::JobStatus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The tracked state of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: JobStatus,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub log: String,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            status: JobStatus::New,
            started: Utc::now(),
            ended: None,
            success: None,
            log: String::new(),
        }
    }
}

/// Shared handle to a [`JobRecord`]
#[derive(Debug, Clone)]
pub struct TrackingHandle {
    inner: Arc<Mutex<JobRecord>>,
}

impl TrackingHandle {
    pub fn new(record: JobRecord) -> Self {
        Self {
            inner: Arc::new(Mutex::new(record)),
        }
    }

    /// Apply a change to the record
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut JobRecord),
    {
        f(&mut self.lock());
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> JobRecord {
        self.lock().clone()
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    fn lock(&self) -> MutexGuard<'_, JobRecord> {
        // A panicked writer leaves a record that is still worth reading.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Job records indexed by id
#[derive(Debug, Clone, Default)]
pub struct TrackingStore {
    records: Arc<Mutex<HashMap<String, TrackingHandle>>>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a record for a newly submitted job
    pub fn create(&self, id: &str, name: &str, version: &str) -> TrackingHandle {
        let handle = TrackingHandle::new(JobRecord::new(id, name, version));
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), handle.clone());
        handle
    }

    pub fn get(&self, id: &str) -> Option<TrackingHandle> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
