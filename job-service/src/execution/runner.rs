// Job Runner
// Drives one execution attempt of a serialized job: acquires and prepares
// a build host, then walks the stage sequence following success and
// failure routing

use crate::execution::context::ExecutionContext;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::notifier::Notifier;
use crate::execution::status::JobStatus;
use crate::expression::{EvalError, Evaluator};
use crate::job::{JobError, SerializedJob, StageView};
use crate::plugins::{
    ActionError, BuildHost, Builder, BuilderError, PluginRegistry, ProvisionError, SourceError,
    Transport, TransportError, TransportOptions,
};

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("unknown builder '{0}'")]
    UnknownBuilder(String),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error("no supported transport for build host '{0}'")]
    NoTransport(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no provisioner for distro '{0}'")]
    UnknownDistro(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("unknown source type '{0}'")]
    UnknownSource(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("checkout of {0} source failed")]
    CheckoutFailed(String),

    #[error("stage not found: {0}")]
    StageNotFound(String),

    #[error("guard on stage '{stage}' could not be evaluated: {source}")]
    Guard {
        stage: String,
        #[source]
        source: EvalError,
    },

    #[error("stage '{stage}' step {step}: {source}")]
    Action {
        stage: String,
        step: usize,
        #[source]
        source: ActionError,
    },
}

/// Engine-side settings for a run
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Builder used when the environment does not name one
    pub default_builder: String,
    pub command_timeout: Option<Duration>,
    pub progress: Option<ProgressSender>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            default_builder: "local".to_string(),
            command_timeout: None,
            progress: None,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: JobStatus,
    pub success: bool,
    /// Exit code of the last step that ran, 0 when none did
    pub exit_code: i32,
}

enum StageResult {
    Skipped,
    Passed(i32),
    Failed(i32),
}

/// Status bookkeeping shared by construction and `run`
struct Reporter {
    notifier: Box<dyn Notifier>,
    status: JobStatus,
    progress: Option<ProgressSender>,
    job_name: String,
}

impl Reporter {
    fn set_status(&mut self, status: JobStatus) {
        if self.status == status {
            return;
        }
        if !self.status.can_transition_to(status) {
            tracing::warn!(from = %self.status, to = %status, "ignoring illegal status transition");
            return;
        }
        tracing::info!(job = %self.job_name, from = %self.status, to = %status, "job status changed");
        self.status = status;
        self.notifier.set_status(status);
        self.progress.send_event(ExecutionEvent::StatusChanged {
            job_name: self.job_name.clone(),
            status,
        });
    }

    fn write_line(&mut self, line: &str) {
        self.notifier.write_line(line);
    }

    fn finish(&mut self, success: bool) {
        self.set_status(if success {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        });
        self.notifier.set_ended(Utc::now());
        self.notifier.completion(success);
    }
}

/// A job execution attempt bound to an acquired build host.
///
/// Created with [`Runner::new`], which does all host preparation, and
/// consumed by [`Runner::run`].
pub struct Runner {
    job: SerializedJob,
    registry: Arc<PluginRegistry>,
    reporter: Reporter,
    ctx: ExecutionContext,
    builder: Box<dyn Builder>,
    host: Option<Box<dyn BuildHost>>,
    transport: Arc<dyn Transport>,
}

impl Runner {
    /// Decode the job record, acquire a build host, connect to it, provision
    /// it and check out the job's sources.
    ///
    /// On any failure the job is reported FAILED, whatever was acquired is
    /// released and the error is returned.
    pub async fn new(
        job_json: &str,
        notifier: Box<dyn Notifier>,
        registry: Arc<PluginRegistry>,
        options: RunnerOptions,
    ) -> Result<Self, RunnerError> {
        let mut reporter = Reporter {
            notifier,
            status: JobStatus::New,
            progress: options.progress.clone(),
            job_name: String::new(),
        };

        let job = match SerializedJob::from_json(job_json) {
            Ok(job) => job,
            Err(e) => {
                reporter.write_line(&format!("Invalid job record: {}", e));
                reporter.finish(false);
                return Err(e.into());
            }
        };
        reporter.job_name = job.name.clone();
        reporter.set_status(JobStatus::Waiting);
        reporter.write_line(&format!("Job {} ({}) waiting for a build host", job.name, job.id));

        let builder_name = job
            .environment
            .get("builder")
            .and_then(Value::as_str)
            .unwrap_or(&options.default_builder)
            .to_string();
        let Some(builder) = registry.create_builder(&builder_name) else {
            reporter.write_line(&format!("Unknown builder: {}", builder_name));
            reporter.finish(false);
            return Err(RunnerError::UnknownBuilder(builder_name));
        };

        let mut ctx = ExecutionContext::for_job(&job.id, &job.name, &job.version);
        ctx.insert("environment", Value::Object(job.environment.clone()));
        for (key, value) in &job.secrets {
            ctx.insert_secret(key.clone(), value.clone());
        }

        let host = match builder.get(&job.environment).await {
            Ok(host) => host,
            Err(e) => {
                reporter.write_line(&format!("Could not acquire a build host: {}", e));
                reporter.finish(false);
                return Err(e.into());
            }
        };
        ctx.merge(host.context_info());
        tracing::info!(job = %job.name, builder = %builder_name, host = host.name(), "acquired build host");

        let transport = match connect(&registry, host.as_ref(), &options).await {
            Ok(transport) => transport,
            Err(e) => {
                reporter.write_line(&format!("Could not connect to {}: {}", host.name(), e));
                if let Err(release) = builder.release(None, host).await {
                    tracing::warn!(error = %release, "failed to release build host");
                }
                reporter.finish(false);
                return Err(e);
            }
        };

        let mut runner = Self {
            job,
            registry,
            reporter,
            ctx,
            builder,
            host: Some(host),
            transport,
        };

        if let Err(e) = runner.prepare_host().await {
            runner.reporter.write_line(&format!("Build host preparation failed: {}", e));
            runner.reporter.finish(false);
            runner.teardown().await;
            return Err(e);
        }

        Ok(runner)
    }

    pub fn status(&self) -> JobStatus {
        self.reporter.status
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    async fn prepare_host(&mut self) -> Result<(), RunnerError> {
        let Some(host) = self.host.as_deref() else {
            return Ok(());
        };

        let provisioner = self
            .registry
            .provisioner(host.distro())
            .ok_or_else(|| RunnerError::UnknownDistro(host.distro().to_string()))?;
        provisioner
            .prepare(
                self.transport.as_ref(),
                host,
                &self.job.environment,
                self.reporter.notifier.as_mut(),
            )
            .await?;

        for source in &self.job.sources {
            let plugin = self
                .registry
                .source(&source.kind)
                .ok_or_else(|| RunnerError::UnknownSource(source.kind.clone()))?;
            let checked_out = plugin
                .checkout(
                    self.transport.as_ref(),
                    &self.ctx,
                    source,
                    self.reporter.notifier.as_mut(),
                )
                .await?;
            if !checked_out {
                return Err(RunnerError::CheckoutFailed(source.kind.clone()));
            }
        }

        Ok(())
    }

    /// Run the stage sequence to completion
    #[tracing::instrument(skip(self), fields(job_id = %self.job.id, job = %self.job.name))]
    pub async fn run(mut self) -> Result<RunOutcome, RunnerError> {
        let started = Instant::now();
        self.reporter.set_status(JobStatus::Started);
        self.reporter.write_line(&format!(
            "Starting job {} {} ({})",
            self.job.name, self.job.version, self.job.id
        ));
        let banner = self.ctx.render_redacted();
        self.reporter.notifier.write(&banner);

        let result = self.run_sequence().await;

        let outcome = match result {
            Ok(exit_code) => {
                let success = self.reporter.status != JobStatus::Failing;
                self.reporter.finish(success);
                tracing::info!(
                    status = %self.reporter.status,
                    exit_code,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "job finished"
                );
                Ok(RunOutcome {
                    status: self.reporter.status,
                    success,
                    exit_code,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "job aborted");
                self.reporter.write_line(&format!("Job aborted: {}", e));
                self.reporter.finish(false);
                Err(e)
            }
        };

        self.reporter.progress.send_event(ExecutionEvent::JobCompleted {
            job_name: self.job.name.clone(),
            success: matches!(outcome, Ok(RunOutcome { success: true, .. })),
            duration: started.elapsed(),
        });
        self.teardown().await;
        outcome
    }

    /// Follow routing from the first stage; returns the last exit code
    async fn run_sequence(&mut self) -> Result<i32, RunnerError> {
        let mut exit_code = 0;
        let mut next = self.job.sequence.first().cloned();

        while let Some(name) = next {
            let stage = self
                .job
                .stage(&name)?
                .ok_or_else(|| RunnerError::StageNotFound(name.clone()))?;

            next = match self.run_stage(&stage).await? {
                StageResult::Skipped => stage.on_success.clone(),
                StageResult::Passed(code) => {
                    exit_code = code;
                    stage.on_success.clone()
                }
                StageResult::Failed(code) => {
                    exit_code = code;
                    self.reporter.set_status(JobStatus::Failing);
                    stage.on_failure.clone()
                }
            };
        }

        Ok(exit_code)
    }

    /// Why the stage's guards block it, if they do
    fn skip_reason(&self, stage: &StageView) -> Result<Option<String>, RunnerError> {
        let guard = |source: EvalError| RunnerError::Guard {
            stage: stage.name.clone(),
            source,
        };
        if let Some(statement) = &stage.only_if {
            if !Evaluator::only_if(statement, &self.ctx).map_err(guard)? {
                return Ok(Some(format!("only_if \"{}\" is false", statement)));
            }
        }
        if let Some(statement) = &stage.not_if {
            if !Evaluator::not_if(statement, &self.ctx).map_err(guard)? {
                return Ok(Some(format!("not_if \"{}\" is true", statement)));
            }
        }
        Ok(None)
    }

    async fn run_stage(&mut self, stage: &StageView) -> Result<StageResult, RunnerError> {
        if let Some(reason) = self.skip_reason(stage)? {
            tracing::info!(stage = %stage.name, %reason, "stage skipped");
            self.reporter
                .write_line(&format!("==> Skipping stage {}: {}", stage.name, reason));
            self.reporter
                .progress
                .send_event(ExecutionEvent::stage_skipped(&stage.name, reason));
            return Ok(StageResult::Skipped);
        }

        let started = Instant::now();
        let steps = stage.ordered_steps();
        self.reporter
            .write_line(&format!("==> Stage {} {}", stage.name, stage.version));
        self.reporter.progress.send_event(ExecutionEvent::stage_started(
            &stage.name,
            &stage.version,
            steps.len(),
        ));

        let mut success = true;
        let mut exit_code = 0;

        for (index, step) in steps.into_iter().enumerate() {
            let mut action = self
                .registry
                .create_action(&step.action)
                .map_err(|source| RunnerError::Action {
                    stage: stage.name.clone(),
                    step: index,
                    source,
                })?;

            let step_started = Instant::now();
            self.reporter.progress.send_event(ExecutionEvent::step_started(
                &stage.name,
                index,
                &step.action.kind,
            ));

            let (passed, code) = match action.prepare(self.transport.clone(), &self.ctx) {
                Err(e) => {
                    self.reporter
                        .write_line(&format!("Step {} ({}) failed: {}", step.sequence, step.action.kind, e));
                    (false, -1)
                }
                Ok(()) => match action.perform(self.reporter.notifier.as_mut()).await {
                    Ok(outcome) => {
                        self.ctx.merge(outcome.context);
                        (outcome.success, outcome.exit_code)
                    }
                    Err(e) => {
                        self.reporter
                            .write_line(&format!("Step {} ({}) failed: {}", step.sequence, step.action.kind, e));
                        (false, -1)
                    }
                },
            };

            tracing::debug!(stage = %stage.name, step = step.sequence, action = %step.action.kind, passed, exit_code = code, "step finished");
            self.reporter.progress.send_event(ExecutionEvent::step_completed(
                &stage.name,
                index,
                passed,
                code,
                step_started.elapsed(),
            ));

            exit_code = code;
            if !passed {
                success = false;
                break;
            }
        }

        if success {
            if let Some(statement) = &stage.fail_if {
                let failed = Evaluator::fail_if(statement, &self.ctx).map_err(|source| {
                    RunnerError::Guard {
                        stage: stage.name.clone(),
                        source,
                    }
                })?;
                if failed {
                    self.reporter
                        .write_line(&format!("fail_if \"{}\" is true", statement));
                    success = false;
                }
            }
        }

        tracing::info!(stage = %stage.name, success, exit_code, "stage finished");
        self.reporter.progress.send_event(ExecutionEvent::stage_completed(
            &stage.name,
            success,
            exit_code,
            started.elapsed(),
        ));

        Ok(if success {
            StageResult::Passed(exit_code)
        } else {
            StageResult::Failed(exit_code)
        })
    }

    /// Release the build host and close the transport; errors are logged only
    async fn teardown(&mut self) {
        if let Some(host) = self.host.take() {
            if let Err(e) = self.builder.release(Some(self.transport.as_ref()), host).await {
                tracing::warn!(error = %e, "failed to release build host");
            }
        }
        match self.transport.close().await {
            Ok(()) | Err(TransportError::Disconnected) => {}
            Err(e) => tracing::warn!(error = %e, "failed to close transport"),
        }
    }
}

/// Connect the last transport kind of the host that the registry knows
async fn connect(
    registry: &PluginRegistry,
    host: &dyn BuildHost,
    options: &RunnerOptions,
) -> Result<Arc<dyn Transport>, RunnerError> {
    let (kind, plugin) = host
        .transports()
        .into_iter()
        .filter_map(|kind| registry.transport(&kind).map(|plugin| (kind, plugin)))
        .last()
        .ok_or_else(|| RunnerError::NoTransport(host.name().to_string()))?;

    tracing::debug!(host = host.name(), transport = %kind, "connecting");
    let transport_options = TransportOptions {
        command_timeout: options.command_timeout,
    };
    Ok(plugin.connect(&host.connect_info(), &transport_options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::events::progress_channel;
    use crate::execution::notifier::LocalNotifier;
    use crate::execution::tracking::{JobRecord, TrackingHandle};
    use crate::job::{InMemoryStageStore, JobDefinition, JobView};
    use crate::plugins::{ConnectInfo, Environment, TransportPlugin};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(yaml: &str) -> String {
        let def = JobDefinition::from_yaml(yaml).unwrap();
        let job = JobView::resolve(
            &def,
            &InMemoryStageStore::new("default"),
            &PluginRegistry::with_defaults(),
        )
        .unwrap();
        job.to_json().unwrap()
    }

    fn notifier() -> (TrackingHandle, Box<dyn Notifier>) {
        let handle = TrackingHandle::new(JobRecord::new("job", "test", "1"));
        (handle.clone(), Box::new(LocalNotifier::new(handle)))
    }

    #[derive(Default)]
    struct Counters {
        released: AtomicUsize,
        connected: AtomicUsize,
        closed: AtomicUsize,
    }

    struct MockHost {
        transports: Vec<String>,
        distro: String,
    }

    impl BuildHost for MockHost {
        fn name(&self) -> &str {
            "mock-host"
        }

        fn connect_info(&self) -> ConnectInfo {
            ConnectInfo {
                host: "mock-host".to_string(),
                username: "build".to_string(),
                password: None,
                workdir: None,
            }
        }

        fn transports(&self) -> Vec<String> {
            self.transports.clone()
        }

        fn distro(&self) -> &str {
            &self.distro
        }

        fn context_info(&self) -> BTreeMap<String, Value> {
            BTreeMap::new()
        }
    }

    struct MockBuilder {
        counters: Arc<Counters>,
        transports: Vec<String>,
        distro: String,
    }

    #[async_trait::async_trait]
    impl Builder for MockBuilder {
        async fn get(&self, _environment: &Environment) -> Result<Box<dyn BuildHost>, BuilderError> {
            Ok(Box::new(MockHost {
                transports: self.transports.clone(),
                distro: self.distro.clone(),
            }))
        }

        async fn release(
            &self,
            _transport: Option<&dyn Transport>,
            _host: Box<dyn BuildHost>,
        ) -> Result<(), BuilderError> {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockTransport {
        counters: Arc<Counters>,
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn exec(
            &self,
            _cmd: &str,
            _path: Option<&str>,
            _log: &mut dyn Notifier,
        ) -> Result<bool, TransportError> {
            Ok(true)
        }

        fn exit_code(&self) -> Option<i32> {
            Some(0)
        }

        async fn upload(&self, _data: &[u8], _path: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn download(&self, _path: &str) -> Result<Vec<u8>, TransportError> {
            Ok(Vec::new())
        }

        async fn export_env(&self, _env: &BTreeMap<String, String>) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockTransportPlugin {
        counters: Arc<Counters>,
    }

    #[async_trait::async_trait]
    impl TransportPlugin for MockTransportPlugin {
        async fn connect(
            &self,
            _info: &ConnectInfo,
            _options: &TransportOptions,
        ) -> Result<Arc<dyn Transport>, TransportError> {
            self.counters.connected.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MockTransport {
                counters: self.counters.clone(),
            }))
        }
    }

    fn mock_registry(counters: &Arc<Counters>, transports: &[&str], distro: &str) -> Arc<PluginRegistry> {
        let mut registry = PluginRegistry::with_defaults();
        let builder_counters = counters.clone();
        let transports: Vec<String> = transports.iter().map(|t| t.to_string()).collect();
        let distro = distro.to_string();
        registry.register_builder("mock", move || {
            Box::new(MockBuilder {
                counters: builder_counters.clone(),
                transports: transports.clone(),
                distro: distro.clone(),
            }) as Box<dyn Builder>
        });
        registry.register_transport(
            "second",
            Arc::new(MockTransportPlugin {
                counters: counters.clone(),
            }),
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_last_known_transport_is_used_and_host_released_on_failure() {
        let counters = Arc::new(Counters::default());
        let registry = mock_registry(&counters, &["local", "nope", "second"], "weird");
        let json = record("environment:\n  builder: mock\n");
        let (handle, notifier) = notifier();

        let result = Runner::new(&json, notifier, registry, RunnerOptions::default()).await;

        assert!(matches!(result, Err(RunnerError::UnknownDistro(distro)) if distro == "weird"));
        assert_eq!(counters.connected.load(Ordering::SeqCst), 1);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert_eq!(handle.snapshot().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_no_supported_transport_releases_host() {
        let counters = Arc::new(Counters::default());
        let registry = mock_registry(&counters, &["nope"], "weird");
        let json = record("environment:\n  builder: mock\n");
        let (handle, notifier) = notifier();

        let result = Runner::new(&json, notifier, registry, RunnerOptions::default()).await;

        assert!(matches!(result, Err(RunnerError::NoTransport(host)) if host == "mock-host"));
        assert_eq!(counters.connected.load(Ordering::SeqCst), 0);
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
        assert_eq!(handle.snapshot().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_sequence_naming_missing_stage_aborts() {
        let json = r#"{"id":"j-1","name":"ghostly","version":"1","sequence":["ghost"]}"#;
        let (handle, notifier) = notifier();
        let runner = Runner::new(
            json,
            notifier,
            Arc::new(PluginRegistry::with_defaults()),
            RunnerOptions::default(),
        )
        .await
        .unwrap();

        let result = runner.run().await;

        assert!(matches!(result, Err(RunnerError::StageNotFound(name)) if name == "ghost"));
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.log.contains("stage not found: ghost"));
    }

    #[tokio::test]
    async fn test_malformed_record_fails() {
        let (handle, notifier) = notifier();
        let result = Runner::new(
            "not json",
            notifier,
            Arc::new(PluginRegistry::with_defaults()),
            RunnerOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(RunnerError::Job(_))));
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.ended.is_some());
        assert_eq!(snapshot.success, Some(false));
    }

    #[tokio::test]
    async fn test_unknown_builder_fails() {
        let (handle, notifier) = notifier();
        let json = record("environment:\n  builder: cloud\n");
        let result = Runner::new(
            &json,
            notifier,
            Arc::new(PluginRegistry::with_defaults()),
            RunnerOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(RunnerError::UnknownBuilder(name)) if name == "cloud"));
        assert_eq!(handle.snapshot().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_skipped_stage_routes_as_success() {
        let json = record(
            r#"
stages:
  - name: deploy
    steps:
      - action: command
        cmd: "false"
sequence:
  - stage: deploy
    only_if: "'%{job_name}' == 'release'"
"#,
        );
        let (progress, mut events) = progress_channel();
        let (handle, notifier) = notifier();
        let options = RunnerOptions {
            progress: Some(progress),
            ..Default::default()
        };
        let runner = Runner::new(&json, notifier, Arc::new(PluginRegistry::with_defaults()), options)
            .await
            .unwrap();
        let outcome = runner.run().await.unwrap();

        assert_eq!(outcome.status, JobStatus::Succeeded);
        assert_eq!(outcome.exit_code, 0);
        assert!(handle.snapshot().log.contains("Skipping stage deploy"));

        let mut skipped = false;
        while let Ok(event) = events.try_recv() {
            if let ExecutionEvent::StageSkipped { stage_name, .. } = event {
                skipped = stage_name == "deploy";
            }
        }
        assert!(skipped);
    }

    #[tokio::test]
    async fn test_not_if_blocks_when_statement_holds() {
        let json = record(
            r#"
stages:
  - name: build
    steps:
      - action: log
        message: building
sequence:
  - stage: build
    not_if: "1 == 1"
"#,
        );
        let (handle, notifier) = notifier();
        let runner = Runner::new(
            &json,
            notifier,
            Arc::new(PluginRegistry::with_defaults()),
            RunnerOptions::default(),
        )
        .await
        .unwrap();
        runner.run().await.unwrap();
        assert!(!handle.snapshot().log.contains("building\n"));
    }

    #[tokio::test]
    async fn test_guard_error_aborts_job() {
        let json = record(
            r#"
stages:
  - name: build
    steps:
      - action: log
        message: hi
sequence:
  - stage: build
    only_if: "%{undefined} > 1"
"#,
        );
        let (handle, notifier) = notifier();
        let runner = Runner::new(
            &json,
            notifier,
            Arc::new(PluginRegistry::with_defaults()),
            RunnerOptions::default(),
        )
        .await
        .unwrap();
        let result = runner.run().await;
        assert!(matches!(result, Err(RunnerError::Guard { .. })));
        assert_eq!(handle.snapshot().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_fail_if_marks_stage_failed() {
        let json = record(
            r#"
stages:
  - name: build
    steps:
      - action: log
        message: "%{job_name}"
sequence:
  - stage: build
    fail_if: "'%{job_name}' == ''"
"#,
        );
        let (handle, notifier) = notifier();
        let runner = Runner::new(
            &json,
            notifier,
            Arc::new(PluginRegistry::with_defaults()),
            RunnerOptions::default(),
        )
        .await
        .unwrap();
        let outcome = runner.run().await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(handle.snapshot().log.contains("fail_if"));
    }

    #[tokio::test]
    async fn test_missing_interpolation_key_fails_step() {
        let json = record(
            r#"
stages:
  - name: build
    steps:
      - action: command
        cmd: "echo %{nowhere}"
sequence:
  - stage: build
"#,
        );
        let (_, notifier) = notifier();
        let runner = Runner::new(
            &json,
            notifier,
            Arc::new(PluginRegistry::with_defaults()),
            RunnerOptions::default(),
        )
        .await
        .unwrap();
        let outcome = runner.run().await.unwrap();
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.exit_code, -1);
    }
}
