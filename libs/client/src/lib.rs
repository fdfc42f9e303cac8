//! # imaged-client
//!
//! Client-side proxy for the imaged image-management daemon.
//!
//! The daemon owns the on-disk backing store and the loop/device-mapper
//! plumbing; this crate only locates it, binds to it within a caller
//! deadline, and forwards the image lifecycle operations of
//! [`imaged_api::ImageManager`] to it.
//!
//! ## Acquisition handshake
//!
//! ```text
//! RemoteImageClient::open(dir, timeout)
//! └── ServiceLocator::acquire
//!     ├── ProcessSupervisor   (run-state query, start signal, bounded wait)
//!     ├── ServiceDirectory    (well-known name -> ServiceEndpoint)
//!     └── open_image_service  (namespace open, never retried)
//! ```
//!
//! Startup races (daemon not yet running, endpoint not yet registered)
//! are retried until the deadline; an explicit denial of the namespace
//! open is not.
//!
//! ## Modules
//!
//! - `supervisor`: process supervisor control surface
//! - `directory`: well-known service name lookup
//! - `rpc`: the RPC surface the proxy consumes
//! - `http`: concrete HTTP-over-Unix-socket transport
//! - `locator`: deadline-bounded acquisition loop
//! - `proxy`: the `ImageManager` implementation

pub mod config;
pub mod directory;
pub mod http;
pub mod locator;
pub mod proxy;
pub mod rpc;
pub mod supervisor;

pub use config::ClientConfig;
pub use locator::ServiceLocator;
pub use proxy::RemoteImageClient;
pub use rpc::{ImageServiceEndpoint, RpcError, ServiceEndpoint};
pub use supervisor::{ProcessSupervisor, RunState};
