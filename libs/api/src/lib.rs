//! # imaged-api
//!
//! Image-management interface for the imaged platform.
//!
//! ## Design Principles
//!
//! - One operation set, multiple backends: the daemon links the co-located
//!   backing-store implementation, remote callers hold the proxy from
//!   `imaged-client`. The backend is chosen at construction time and call
//!   sites never branch on it.
//! - The failure vocabulary is booleans, `Option`, and empty collections.
//!   The interface predates the remote transport and has no structured
//!   error channel; diagnostics go to the log.
//! - Capabilities that only make sense in-process (partition openers,
//!   init callbacks) are explicit types so a backend that cannot carry
//!   them is a visible, testable behavior rather than an omission.

mod manager;
mod types;

pub use manager::{ImageManager, MapAllCallback, PartitionOpener};
pub use types::{
    MappedImage, CREATE_IMAGE_DEFAULT, CREATE_IMAGE_READONLY, CREATE_IMAGE_ZERO_FILL,
};
