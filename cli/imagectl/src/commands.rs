//! Subcommand definitions and dispatch.
//!
//! Operations surface only the interface's boolean vocabulary; when
//! one fails, the reason is in the daemon log, not here.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use imaged_api::ImageManager;
use imaged_client::RemoteImageClient;

#[derive(Parser)]
#[command(name = "imgctl", about = "Manage imaged backing images", version)]
pub struct Cli {
    /// Backing-store namespace directory.
    #[arg(long, global = true, default_value = "/data/images")]
    pub namespace: String,

    /// Service acquisition timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a backing image.
    Create {
        name: String,
        /// Image size in bytes.
        #[arg(long)]
        size: u64,
        /// Creation flags (see imaged-api).
        #[arg(long, default_value_t = 0)]
        flags: u32,
    },

    /// Delete a backing image.
    Delete { name: String },

    /// Map an image as a block device and print the device path.
    Map {
        name: String,
        /// How long to wait for the device to appear, in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        device_timeout_ms: u64,
    },

    /// Unmap a mapped image.
    Unmap { name: String },

    /// Report whether a backing image exists.
    Exists { name: String },

    /// Report whether an image is currently mapped.
    Mapped { name: String },

    /// Zero-fill a newly created image.
    ZeroFill {
        name: String,
        #[arg(long)]
        bytes: u64,
    },

    /// Print the device path of a mapped image.
    Device { name: String },

    /// List all backing images in the namespace.
    List,

    /// Remove every backing image in the namespace.
    RemoveAll,

    /// Remove images that were marked disabled.
    RemoveDisabled,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let timeout = Duration::from_millis(self.timeout_ms);

        let Some(client) = RemoteImageClient::open(&self.namespace, timeout).await else {
            bail!(
                "image service unavailable (namespace {}, waited {}ms)",
                self.namespace,
                self.timeout_ms
            );
        };

        match self.command {
            Command::Create { name, size, flags } => {
                if !client.create_backing_image(&name, size, flags).await {
                    bail!("failed to create image {name}");
                }
            }
            Command::Delete { name } => {
                if !client.delete_backing_image(&name).await {
                    bail!("failed to delete image {name}");
                }
            }
            Command::Map {
                name,
                device_timeout_ms,
            } => {
                let timeout = Duration::from_millis(device_timeout_ms);
                match client.map_image_device(&name, timeout).await {
                    Some(mapped) => println!("{}", mapped.path),
                    None => bail!("failed to map image {name}"),
                }
            }
            Command::Unmap { name } => {
                if !client.unmap_image_device(&name).await {
                    bail!("failed to unmap image {name}");
                }
            }
            Command::Exists { name } => {
                println!("{}", client.backing_image_exists(&name).await);
            }
            Command::Mapped { name } => {
                println!("{}", client.is_image_mapped(&name).await);
            }
            Command::ZeroFill { name, bytes } => {
                if !client.zero_fill_new_image(&name, bytes).await {
                    bail!("failed to zero-fill image {name}");
                }
            }
            Command::Device { name } => match client.get_mapped_image_device(&name).await {
                Some(path) => println!("{path}"),
                None => bail!("image {name} is not mapped"),
            },
            Command::List => {
                for name in client.get_all_backing_images().await {
                    println!("{name}");
                }
            }
            Command::RemoveAll => {
                if !client.remove_all_images().await {
                    bail!("failed to remove all images");
                }
            }
            Command::RemoveDisabled => {
                if !client.remove_disabled_images().await {
                    bail!("failed to remove disabled images");
                }
            }
        }

        Ok(())
    }
}
