//! Boundary types shared by every image-manager backend.

/// Create a writable image with no special handling.
pub const CREATE_IMAGE_DEFAULT: u32 = 0;

/// The image is mapped read-only after creation.
pub const CREATE_IMAGE_READONLY: u32 = 1 << 0;

/// Zero-fill the image at creation time rather than lazily.
pub const CREATE_IMAGE_ZERO_FILL: u32 = 1 << 1;

/// Result record of a successful map operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedImage {
    /// Path of the block device backing the image.
    pub path: String,
}
