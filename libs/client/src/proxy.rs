//! Remote image-management proxy.
//!
//! Implements [`ImageManager`] by forwarding each operation to the
//! acquired daemon endpoints, one round-trip per call. Transport
//! failures are logged and collapsed into the interface's boolean
//! failure vocabulary; they never change the proxy's state and there is
//! no rebind. Three operations would need to carry live local
//! capabilities across the socket and fail unconditionally.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use imaged_api::{ImageManager, MapAllCallback, MappedImage, PartitionOpener};

use crate::config::ClientConfig;
use crate::directory::SocketDirectory;
use crate::locator::ServiceLocator;
use crate::rpc::{ImageServiceEndpoint, ServiceEndpoint};
use crate::supervisor::SpawnSupervisor;

/// The wire timeout field is a signed 32-bit millisecond count; the
/// local API takes a `Duration`.
fn clamp_timeout_ms(timeout: Duration) -> i32 {
    timeout.as_millis().min(i32::MAX as u128) as i32
}

/// `ImageManager` backend that forwards to the imaged daemon.
///
/// Constructed only after a successful acquisition, so every call site
/// holds a bound pair of handles. Handles are immutable after
/// construction; concurrent calls on one client are safe.
pub struct RemoteImageClient {
    /// Kept alive for the proxy's lifetime; the namespace handle is
    /// only valid while the top-level one is.
    _service: Arc<dyn ServiceEndpoint>,
    manager: Arc<dyn ImageServiceEndpoint>,
}

impl RemoteImageClient {
    /// Wrap already-acquired daemon handles.
    pub fn new(
        service: Arc<dyn ServiceEndpoint>,
        manager: Arc<dyn ImageServiceEndpoint>,
    ) -> Self {
        Self {
            _service: service,
            manager,
        }
    }

    /// Open the image service for `dir` using the environment-derived
    /// configuration, starting the daemon if necessary.
    ///
    /// `None` means the service was unavailable within `timeout` (or
    /// denied the namespace open); callers treat it as unavailability,
    /// not a fatal error.
    pub async fn open(dir: &str, timeout: Duration) -> Option<Self> {
        let config = ClientConfig::from_env();
        Self::open_with_config(&config, dir, timeout).await
    }

    /// Open against an explicit configuration.
    pub async fn open_with_config(
        config: &ClientConfig,
        dir: &str,
        timeout: Duration,
    ) -> Option<Self> {
        let supervisor = Arc::new(SpawnSupervisor::new(&config.daemon_bin, &config.run_dir));
        let directory = Arc::new(SocketDirectory::new(&config.run_dir));
        let locator = ServiceLocator::new(supervisor, directory, config.service_name.clone());
        Self::open_with(&locator, dir, timeout).await
    }

    /// Open through an explicit locator. Tests inject fake supervisor
    /// and directory implementations this way.
    pub async fn open_with(
        locator: &ServiceLocator,
        dir: &str,
        timeout: Duration,
    ) -> Option<Self> {
        let (service, manager) = locator.acquire(dir, timeout).await?;
        Some(Self::new(service, manager))
    }
}

#[async_trait]
impl ImageManager for RemoteImageClient {
    async fn create_backing_image(&self, name: &str, size: u64, flags: u32) -> bool {
        match self.manager.create_backing_image(name, size, flags).await {
            Ok(()) => true,
            Err(e) => {
                error!(image = %name, error = %e, "create_backing_image failed");
                false
            }
        }
    }

    async fn delete_backing_image(&self, name: &str) -> bool {
        match self.manager.delete_backing_image(name).await {
            Ok(()) => true,
            Err(e) => {
                error!(image = %name, error = %e, "delete_backing_image failed");
                false
            }
        }
    }

    async fn map_image_device(&self, name: &str, timeout: Duration) -> Option<MappedImage> {
        let timeout_ms = clamp_timeout_ms(timeout);
        match self.manager.map_image_device(name, timeout_ms).await {
            Ok(map) => Some(map),
            Err(e) => {
                error!(image = %name, error = %e, "map_image_device failed");
                None
            }
        }
    }

    async fn unmap_image_device(&self, name: &str) -> bool {
        match self.manager.unmap_image_device(name).await {
            Ok(()) => true,
            Err(e) => {
                error!(image = %name, error = %e, "unmap_image_device failed");
                false
            }
        }
    }

    async fn backing_image_exists(&self, name: &str) -> bool {
        match self.manager.backing_image_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                error!(image = %name, error = %e, "backing_image_exists failed");
                false
            }
        }
    }

    async fn is_image_mapped(&self, name: &str) -> bool {
        match self.manager.is_image_mapped(name).await {
            Ok(mapped) => mapped,
            Err(e) => {
                error!(image = %name, error = %e, "is_image_mapped failed");
                false
            }
        }
    }

    async fn map_image_with_device_mapper(
        &self,
        _opener: &dyn PartitionOpener,
        name: &str,
    ) -> Option<MappedImage> {
        // The opener is a live capability; it cannot cross the socket.
        error!(image = %name, "map_image_with_device_mapper is not available remotely");
        None
    }

    async fn zero_fill_new_image(&self, name: &str, bytes: u64) -> bool {
        match self.manager.zero_fill_new_image(name, bytes).await {
            Ok(()) => true,
            Err(e) => {
                error!(image = %name, error = %e, "zero_fill_new_image failed");
                false
            }
        }
    }

    async fn remove_all_images(&self) -> bool {
        match self.manager.remove_all_images().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "remove_all_images failed");
                false
            }
        }
    }

    async fn disable_image(&self, name: &str) -> bool {
        // Disabling is only meaningful where the backing store is
        // co-located with the caller.
        error!(image = %name, "disable_image is not available remotely");
        false
    }

    async fn remove_disabled_images(&self) -> bool {
        match self.manager.remove_disabled_images().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "remove_disabled_images failed");
                false
            }
        }
    }

    async fn get_mapped_image_device(&self, name: &str) -> Option<String> {
        match self.manager.get_mapped_image_device(name).await {
            // An empty path is the daemon's way of saying "not mapped".
            Ok(path) if !path.is_empty() => Some(path),
            Ok(_) => None,
            Err(e) => {
                error!(image = %name, error = %e, "get_mapped_image_device failed");
                None
            }
        }
    }

    async fn map_all_images(&self, _init: &MapAllCallback) -> bool {
        // A local callback cannot be invoked from the daemon process.
        error!("map_all_images is not available remotely");
        false
    }

    async fn get_all_backing_images(&self) -> Vec<String> {
        match self.manager.get_all_backing_images().await {
            Ok(images) => images,
            Err(e) => {
                // This call has no failure channel; report emptiness.
                error!(error = %e, "get_all_backing_images failed");
                Vec::new()
            }
        }
    }
}
