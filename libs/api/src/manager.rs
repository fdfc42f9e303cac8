//! The image lifecycle operation set.

use std::collections::BTreeSet;
use std::fs::File;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::MappedImage;

/// Local capability for opening block partitions by name.
///
/// This is a live object, not data: it cannot be carried across a
/// transport boundary. Backends that run in a different process reject
/// the operations that need one.
pub trait PartitionOpener: Send + Sync {
    /// Open the named partition's block device.
    fn open_partition(&self, name: &str) -> std::io::Result<File>;
}

/// Init callback invoked with the set of images mapped so far.
///
/// Returning `false` aborts the map-all pass.
pub type MapAllCallback = dyn Fn(BTreeSet<String>) -> bool + Send + Sync;

/// Image lifecycle operations over one backing-store namespace.
///
/// Every operation reports failure through the interface's designated
/// failure value (`false`, `None`, or an empty collection). Backends
/// log the underlying reason but never surface it to the caller.
#[async_trait]
pub trait ImageManager: Send + Sync {
    /// Create a backing image of `size` bytes.
    async fn create_backing_image(&self, name: &str, size: u64, flags: u32) -> bool;

    /// Delete a backing image and any state associated with it.
    async fn delete_backing_image(&self, name: &str) -> bool;

    /// Map an image as a block device, waiting up to `timeout` for the
    /// device to appear.
    async fn map_image_device(&self, name: &str, timeout: Duration) -> Option<MappedImage>;

    /// Unmap a previously mapped image.
    async fn unmap_image_device(&self, name: &str) -> bool;

    /// Whether a backing image exists.
    async fn backing_image_exists(&self, name: &str) -> bool;

    /// Whether the image is currently mapped.
    async fn is_image_mapped(&self, name: &str) -> bool;

    /// Map an image through device-mapper using a caller-supplied
    /// partition opener.
    async fn map_image_with_device_mapper(
        &self,
        opener: &dyn PartitionOpener,
        name: &str,
    ) -> Option<MappedImage>;

    /// Write zeroes over a newly created image.
    async fn zero_fill_new_image(&self, name: &str, bytes: u64) -> bool;

    /// Remove every backing image in the namespace.
    async fn remove_all_images(&self) -> bool;

    /// Mark an image disabled so it is skipped when mapping all images.
    async fn disable_image(&self, name: &str) -> bool;

    /// Remove images previously marked disabled.
    async fn remove_disabled_images(&self) -> bool;

    /// Device path of a mapped image, or `None` if it is not mapped.
    async fn get_mapped_image_device(&self, name: &str) -> Option<String>;

    /// Map every image in the namespace, invoking `init` with the set
    /// of images mapped so far.
    async fn map_all_images(&self, init: &MapAllCallback) -> bool;

    /// Names of all backing images in the namespace.
    async fn get_all_backing_images(&self) -> Vec<String>;
}
