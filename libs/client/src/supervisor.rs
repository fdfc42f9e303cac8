//! Process supervisor control surface.
//!
//! The locator treats the daemon's process state as key/value data:
//! read a named service's run state, send it a start signal, wait
//! (bounded) for it to reach a target state. `SpawnSupervisor` is the
//! production implementation; tests inject fakes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Poll period while waiting for a service to change state.
const STATE_POLL_PERIOD: Duration = Duration::from_millis(50);

/// Run state of a supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// Errors from the supervisor control surface.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown service: {0}")]
    UnknownService(String),
}

/// Control surface over a named service's process.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Current run state of the named service.
    async fn run_state(&self, service: &str) -> Result<RunState, SupervisorError>;

    /// Ask the supervisor to start the named service.
    async fn start(&self, service: &str) -> Result<(), SupervisorError>;

    /// Wait until the named service reaches `target` or `timeout`
    /// elapses. Returns `false` on timeout.
    async fn await_state(
        &self,
        service: &str,
        target: RunState,
        timeout: Duration,
    ) -> Result<bool, SupervisorError>;
}

/// Supervisor that runs services directly as child processes.
///
/// Run state is derived from the pidfile written at spawn time; a dead
/// pid or a missing pidfile reads as stopped. A service started by
/// another supervisor instance is still visible through its pidfile.
pub struct SpawnSupervisor {
    binary: PathBuf,
    run_dir: PathBuf,
    /// Child handles for processes this instance spawned.
    children: RwLock<HashMap<String, Child>>,
}

impl SpawnSupervisor {
    pub fn new<B: AsRef<Path>, R: AsRef<Path>>(binary: B, run_dir: R) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            run_dir: run_dir.as_ref().to_path_buf(),
            children: RwLock::new(HashMap::new()),
        }
    }

    fn pidfile(&self, service: &str) -> PathBuf {
        self.run_dir.join(format!("{service}.pid"))
    }

    /// Probe liveness without delivering a signal.
    fn pid_alive(pid: i32) -> bool {
        unsafe { libc::kill(pid, 0) == 0 }
    }

    /// Reap children that have already exited so a restarted service
    /// does not read as running through a zombie pid.
    async fn reap_exited(&self, service: &str) {
        let mut children = self.children.write().await;
        if let Some(child) = children.get_mut(service) {
            if matches!(child.try_wait(), Ok(Some(_))) {
                children.remove(service);
            }
        }
    }
}

#[async_trait]
impl ProcessSupervisor for SpawnSupervisor {
    async fn run_state(&self, service: &str) -> Result<RunState, SupervisorError> {
        self.reap_exited(service).await;

        let pidfile = self.pidfile(service);
        let contents = match std::fs::read_to_string(&pidfile) {
            Ok(contents) => contents,
            Err(_) => return Ok(RunState::Stopped),
        };

        match contents.trim().parse::<i32>() {
            Ok(pid) if Self::pid_alive(pid) => Ok(RunState::Running),
            _ => Ok(RunState::Stopped),
        }
    }

    async fn start(&self, service: &str) -> Result<(), SupervisorError> {
        std::fs::create_dir_all(&self.run_dir)?;

        let child = Command::new(&self.binary)
            .arg("--run-dir")
            .arg(&self.run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(pid) = child.id() {
            std::fs::write(self.pidfile(service), pid.to_string())?;
        }

        info!(
            service = %service,
            binary = %self.binary.display(),
            "Spawned service process"
        );

        self.children.write().await.insert(service.to_string(), child);
        Ok(())
    }

    async fn await_state(
        &self,
        service: &str,
        target: RunState,
        timeout: Duration,
    ) -> Result<bool, SupervisorError> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.run_state(service).await? == target {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    service = %service,
                    target = ?target,
                    "Timed out waiting for service state"
                );
                return Ok(false);
            }

            tokio::time::sleep(STATE_POLL_PERIOD.min(deadline - now)).await;
        }
    }
}
