// Plugins Module
// Contracts for builders, transports, provisioners, sources and actions,
// plus the registry that maps declared kind names to implementations

pub mod error;
pub mod git_source;
pub mod local_builder;
pub mod local_provisioner;
pub mod local_transport;
pub mod registry;

pub use error::{ActionError, BuilderError, ProvisionError, SourceError, TransportError};
pub use git_source::GitSource;
pub use local_builder::{LocalBuildHost, LocalBuilder};
pub use local_provisioner::LocalProvisioner;
pub use local_transport::{LocalTransport, LocalTransportPlugin};
pub use registry::{ActionFactory, BuilderFactory, PluginKind, PluginRegistry};

use crate::execution::context::ExecutionContext;
use crate::execution::notifier::Notifier;
use crate::job::SourceSpec;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Opaque provisioning hints from the job definition
pub type Environment = Map<String, Value>;

/// Arguments of a serialized action
pub type ActionArgs = Map<String, Value>;

/// How to reach a build host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    pub host: String,
    pub username: String,
    pub password: Option<String>,
    /// Directory commands run in when no path is given
    pub workdir: Option<String>,
}

/// Per-connection settings supplied by the engine rather than the host
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub command_timeout: Option<Duration>,
}

/// A machine or container that stage actions run on
pub trait BuildHost: Send + Sync {
    fn name(&self) -> &str;

    fn connect_info(&self) -> ConnectInfo;

    /// Transport kinds the host accepts, most preferred first
    fn transports(&self) -> Vec<String>;

    /// Distribution name used to pick a provisioner
    fn distro(&self) -> &str;

    /// Fields merged into the execution context
    fn context_info(&self) -> BTreeMap<String, Value>;
}

/// Acquires and releases build hosts
#[async_trait::async_trait]
pub trait Builder: Send + Sync {
    async fn get(&self, environment: &Environment) -> Result<Box<dyn BuildHost>, BuilderError>;

    async fn release(
        &self,
        transport: Option<&dyn Transport>,
        host: Box<dyn BuildHost>,
    ) -> Result<(), BuilderError>;
}

/// Remote execution and file transfer channel to a build host
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Run a command, streaming its output to `log`. Returns whether it
    /// exited successfully; the exit code is kept for [`Transport::exit_code`].
    async fn exec(
        &self,
        cmd: &str,
        path: Option<&str>,
        log: &mut dyn Notifier,
    ) -> Result<bool, TransportError>;

    /// Exit code of the last command, if it exited normally
    fn exit_code(&self) -> Option<i32>;

    async fn upload(&self, data: &[u8], path: &str) -> Result<(), TransportError>;

    async fn download(&self, path: &str) -> Result<Vec<u8>, TransportError>;

    /// Set variables for every later command
    async fn export_env(&self, env: &BTreeMap<String, String>) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Creates connected transports of one kind
#[async_trait::async_trait]
pub trait TransportPlugin: Send + Sync {
    async fn connect(
        &self,
        info: &ConnectInfo,
        options: &TransportOptions,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Distribution-specific host preparation
#[async_trait::async_trait]
pub trait Provisioner: Send + Sync {
    async fn prepare(
        &self,
        transport: &dyn Transport,
        host: &dyn BuildHost,
        environment: &Environment,
        log: &mut dyn Notifier,
    ) -> Result<(), ProvisionError>;
}

/// Fetches a declared source onto the build host
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    async fn checkout(
        &self,
        transport: &dyn Transport,
        ctx: &ExecutionContext,
        source: &SourceSpec,
        log: &mut dyn Notifier,
    ) -> Result<bool, SourceError>;
}

/// Result of performing an action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    pub exit_code: i32,
    /// Fields to merge into the execution context
    pub context: BTreeMap<String, Value>,
}

impl ActionOutcome {
    pub fn from_exit(success: bool, exit_code: i32) -> Self {
        Self {
            success,
            exit_code,
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// One unit of work inside a stage
#[async_trait::async_trait]
pub trait Action: Send {
    /// Bind the transport and resolve context references
    fn prepare(
        &mut self,
        transport: Arc<dyn Transport>,
        ctx: &ExecutionContext,
    ) -> Result<(), ActionError>;

    async fn perform(&mut self, log: &mut dyn Notifier) -> Result<ActionOutcome, ActionError>;
}
