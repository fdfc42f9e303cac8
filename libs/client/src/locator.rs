//! Deadline-bounded service acquisition.
//!
//! Acquisition has two phases with different retry semantics:
//!
//! - **Locate** (retried): start the daemon if it is not running, wait
//!   for it to come up, resolve its endpoint in the directory. Failures
//!   here are startup races and are retried until the caller's deadline.
//! - **Open** (never retried): one call to open the backing-store
//!   namespace. A denial from a live daemon is a decision, not a race.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::directory::ServiceDirectory;
use crate::rpc::{ImageServiceEndpoint, ServiceEndpoint};
use crate::supervisor::{ProcessSupervisor, RunState};

/// Grace period after the process reports running, to let it finish
/// registering its endpoint. Registration is asynchronous relative to
/// the run state.
const REGISTRATION_GRACE: Duration = Duration::from_millis(250);

/// Delay between failed acquisition attempts, so a daemon that dies
/// right after starting does not cause a tight loop against the
/// directory.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Locates the daemon's image service within a caller deadline.
pub struct ServiceLocator {
    supervisor: Arc<dyn ProcessSupervisor>,
    directory: Arc<dyn ServiceDirectory>,
    service: String,
}

impl ServiceLocator {
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        directory: Arc<dyn ServiceDirectory>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            supervisor,
            directory,
            service: service.into(),
        }
    }

    /// Acquire the image service for `dir`, starting and binding to the
    /// daemon within `timeout`.
    ///
    /// A zero timeout fails immediately without consulting the
    /// supervisor. Returns both handles; the proxy must keep the
    /// top-level one alive for its own lifetime.
    pub async fn acquire(
        &self,
        dir: &str,
        timeout: Duration,
    ) -> Option<(Arc<dyn ServiceEndpoint>, Arc<dyn ImageServiceEndpoint>)> {
        if timeout.is_zero() {
            error!(service = %self.service, "Cannot acquire service with zero timeout");
            return None;
        }

        let service = self.locate(timeout).await?;

        match service.open_image_service(dir).await {
            Ok(manager) => Some((service, manager)),
            Err(e) => {
                error!(
                    service = %self.service,
                    dir = %dir,
                    error = %e,
                    "Daemon refused to open image service"
                );
                None
            }
        }
    }

    /// Resolve the daemon's top-level endpoint, retrying startup races
    /// until `timeout` elapses on the monotonic clock.
    async fn locate(&self, timeout: Duration) -> Option<Arc<dyn ServiceEndpoint>> {
        let start = Instant::now();

        loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            if let Some(endpoint) = self.attempt(remaining).await {
                return Some(endpoint);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }
            tokio::time::sleep(RETRY_DELAY.min(timeout - elapsed)).await;
        }

        error!(
            service = %self.service,
            timeout_ms = timeout.as_millis() as u64,
            "Timed out acquiring service endpoint"
        );
        None
    }

    /// One acquisition attempt with the remaining `budget`: ensure the
    /// process is running (one start signal at most), then resolve the
    /// endpoint.
    async fn attempt(&self, budget: Duration) -> Option<Arc<dyn ServiceEndpoint>> {
        match self.supervisor.run_state(&self.service).await {
            Ok(RunState::Running) => {}
            Ok(RunState::Stopped) => {
                if let Err(e) = self.supervisor.start(&self.service).await {
                    error!(service = %self.service, error = %e, "Failed to signal service start");
                    return None;
                }

                match self
                    .supervisor
                    .await_state(&self.service, RunState::Running, budget)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(
                            service = %self.service,
                            budget_ms = budget.as_millis() as u64,
                            "Service did not reach running state in time"
                        );
                        return None;
                    }
                    Err(e) => {
                        error!(service = %self.service, error = %e, "State wait failed");
                        return None;
                    }
                }

                // Registration lags the running state; give the fresh
                // process time to bind its endpoint.
                tokio::time::sleep(REGISTRATION_GRACE).await;
            }
            Err(e) => {
                error!(service = %self.service, error = %e, "Run-state query failed");
                return None;
            }
        }

        match self.directory.resolve(&self.service).await {
            Ok(Some(endpoint)) => Some(endpoint),
            Ok(None) => {
                debug!(service = %self.service, "Service not yet registered");
                None
            }
            Err(e) => {
                error!(service = %self.service, error = %e, "Directory lookup failed");
                None
            }
        }
    }
}
