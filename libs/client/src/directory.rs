//! Well-known service name lookup.
//!
//! The daemon registers itself by binding an API socket under the run
//! directory. Resolution succeeds once that socket exists; before then
//! the name is simply absent, which the locator treats as a startup
//! race rather than an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::http::HttpServiceEndpoint;
use crate::rpc::{RpcError, ServiceEndpoint};

/// Resolve a well-known service name to its top-level endpoint.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// `Ok(None)` means the name is not registered yet.
    async fn resolve(&self, name: &str)
        -> Result<Option<Arc<dyn ServiceEndpoint>>, RpcError>;
}

/// Directory backed by a run directory of API sockets.
pub struct SocketDirectory {
    run_dir: PathBuf,
}

impl SocketDirectory {
    pub fn new<P: AsRef<Path>>(run_dir: P) -> Self {
        Self {
            run_dir: run_dir.as_ref().to_path_buf(),
        }
    }

    fn socket_path(&self, name: &str) -> PathBuf {
        self.run_dir.join(format!("{name}.sock"))
    }
}

#[async_trait]
impl ServiceDirectory for SocketDirectory {
    async fn resolve(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn ServiceEndpoint>>, RpcError> {
        let path = self.socket_path(name);
        if !path.exists() {
            debug!(service = %name, path = %path.display(), "Service socket not present");
            return Ok(None);
        }
        Ok(Some(Arc::new(HttpServiceEndpoint::new(path))))
    }
}
