//! The daemon RPC surface consumed by the proxy.
//!
//! One method per remote-supported operation, each returning a
//! transport-level result. The concrete transport lives in
//! [`crate::http`]; tests substitute in-process fakes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use imaged_api::MappedImage;

/// Errors from the daemon RPC transport.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("socket not found: {0}")]
    SocketNotFound(String),
}

impl From<hyper::http::Error> for RpcError {
    fn from(err: hyper::http::Error) -> Self {
        RpcError::Api {
            status: 0,
            message: err.to_string(),
        }
    }
}

/// Top-level handle to the daemon.
///
/// Obtained once from the service directory; the daemon process owns
/// its lifetime. Opening a backing-store namespace yields the
/// per-namespace [`ImageServiceEndpoint`].
#[async_trait]
pub trait ServiceEndpoint: Send + Sync {
    /// Open the image service for a backing-store directory.
    async fn open_image_service(
        &self,
        dir: &str,
    ) -> Result<Arc<dyn ImageServiceEndpoint>, RpcError>;
}

/// Per-namespace image service handle.
///
/// Each method is one round-trip to the daemon. Note the map timeout
/// is a signed 32-bit millisecond count: the wire field is narrower
/// than the local API's `Duration`.
#[async_trait]
pub trait ImageServiceEndpoint: Send + Sync + std::fmt::Debug {
    async fn create_backing_image(
        &self,
        name: &str,
        size: u64,
        flags: u32,
    ) -> Result<(), RpcError>;

    async fn delete_backing_image(&self, name: &str) -> Result<(), RpcError>;

    async fn map_image_device(
        &self,
        name: &str,
        timeout_ms: i32,
    ) -> Result<MappedImage, RpcError>;

    async fn unmap_image_device(&self, name: &str) -> Result<(), RpcError>;

    async fn backing_image_exists(&self, name: &str) -> Result<bool, RpcError>;

    async fn is_image_mapped(&self, name: &str) -> Result<bool, RpcError>;

    async fn zero_fill_new_image(&self, name: &str, bytes: u64) -> Result<(), RpcError>;

    async fn remove_all_images(&self) -> Result<(), RpcError>;

    async fn remove_disabled_images(&self) -> Result<(), RpcError>;

    /// Device path of a mapped image. The daemon reports "not mapped"
    /// as an empty path, not as an error.
    async fn get_mapped_image_device(&self, name: &str) -> Result<String, RpcError>;

    async fn get_all_backing_images(&self) -> Result<Vec<String>, RpcError>;
}
