// Runtime Execution Context
// The key/value bag threaded through a job run

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::collections::BTreeMap;

/// Keys that are never echoed into logs
const REDACTED: &str = "********";

/// Mutable context shared by every stage and action of one job run.
///
/// Values are JSON values so build hosts and actions can publish numbers and
/// structured data, while string interpolation sees their textual form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    values: BTreeMap<String, Value>,
    #[serde(skip)]
    secret_keys: Vec<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context with the identity of a job
    pub fn for_job(id: &str, name: &str, version: &str) -> Self {
        let mut ctx = Self::new();
        ctx.insert("job_id", id);
        ctx.insert("job_name", name);
        ctx.insert("job_version", version);
        ctx
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Insert a value that must not appear in rendered output
    pub fn insert_secret(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if !self.secret_keys.contains(&key) {
            self.secret_keys.push(key.clone());
        }
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Textual form of a value, as used by interpolation
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).map(value_to_string)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merge another map into this context; incoming keys win
    pub fn merge<I, K>(&mut self, other: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (key, value) in other {
            self.values.insert(key.into(), value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render the context one `key: value` pair per line, masking secrets
    pub fn render_redacted(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            let shown = if self.secret_keys.contains(key) {
                REDACTED.to_string()
            } else {
                value_to_string(value)
            };
            out.push_str(&format!("{}: {}\n", key, shown));
        }
        out
    }

    /// Mask every secret value that occurs in `text`
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for key in &self.secret_keys {
            let Some(secret) = self.get_string(key) else {
                continue;
            };
            if !secret.is_empty() {
                out = out.replace(&secret, REDACTED);
            }
        }
        out
    }
}

/// Convert a JSON value to the string interpolation substitutes for it
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
