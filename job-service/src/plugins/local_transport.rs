// Local Transport
// Runs commands on the machine the worker itself is running on

use crate::execution::notifier::Notifier;
use crate::plugins::{ConnectInfo, Transport, TransportError, TransportOptions, TransportPlugin};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Connects [`LocalTransport`]s
pub struct LocalTransportPlugin;

#[async_trait::async_trait]
impl TransportPlugin for LocalTransportPlugin {
    async fn connect(
        &self,
        info: &ConnectInfo,
        options: &TransportOptions,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let shell = which::which("sh").map_err(|e| TransportError::Connect {
            host: info.host.clone(),
            reason: format!("no shell available: {}", e),
        })?;

        let workdir = match &info.workdir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };

        tracing::debug!(host = %info.host, shell = %shell.display(), workdir = %workdir.display(), "local transport connected");

        Ok(Arc::new(LocalTransport {
            shell,
            workdir,
            timeout: options.command_timeout,
            env: Mutex::new(BTreeMap::new()),
            exit_code: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Transport backed by `sh -c` child processes
pub struct LocalTransport {
    shell: PathBuf,
    workdir: PathBuf,
    timeout: Option<Duration>,
    env: Mutex<BTreeMap<String, String>>,
    exit_code: Mutex<Option<i32>>,
    closed: AtomicBool,
}

impl LocalTransport {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    fn set_exit_code(&self, code: Option<i32>) {
        *self.exit_code.lock().unwrap_or_else(PoisonError::into_inner) = code;
    }

    /// Spawn the command and stream both pipes into `log` until they close
    async fn run(
        &self,
        cmd: &str,
        dir: &Path,
        log: &mut dyn Notifier,
    ) -> Result<Option<i32>, TransportError> {
        let env = self
            .env
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(cmd)
            .current_dir(dir)
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout was not captured")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stderr was not captured")
        })?;

        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut stdout_done = false;
        let mut stderr_done = false;

        // Lines are read as raw bytes so undecodable output keeps the pipes drained.
        while !(stdout_done && stderr_done) {
            tokio::select! {
                read = stdout.read_until(b'\n', &mut out_buf), if !stdout_done => {
                    stdout_done = flush_line(read?, &mut out_buf, log);
                },
                read = stderr.read_until(b'\n', &mut err_buf), if !stderr_done => {
                    stderr_done = flush_line(read?, &mut err_buf, log);
                },
            }
        }

        let status = child.wait().await?;
        Ok(status.code())
    }
}

/// Write one buffered line to `log`; returns true once the pipe hit EOF
fn flush_line(read: usize, buf: &mut Vec<u8>, log: &mut dyn Notifier) -> bool {
    if read == 0 {
        return true;
    }
    let line = String::from_utf8_lossy(buf);
    log.write_line(line.trim_end_matches(['\n', '\r']));
    buf.clear();
    false
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn exec(
        &self,
        cmd: &str,
        path: Option<&str>,
        log: &mut dyn Notifier,
    ) -> Result<bool, TransportError> {
        self.ensure_open()?;
        let dir = path.map(|p| self.resolve(p)).unwrap_or_else(|| self.workdir.clone());

        let code = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.run(cmd, &dir, log)).await {
                Ok(result) => result?,
                Err(_) => {
                    // The child is killed when its handle drops with the future.
                    self.set_exit_code(None);
                    return Err(TransportError::Timeout(timeout));
                }
            },
            None => self.run(cmd, &dir, log).await?,
        };

        self.set_exit_code(code);
        Ok(code == Some(0))
    }

    fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn upload(&self, data: &[u8], path: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, data).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        self.ensure_open()?;
        Ok(tokio::fs::read(self.resolve(path)).await?)
    }

    async fn export_env(&self, env: &BTreeMap<String, String>) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.env
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }
}
