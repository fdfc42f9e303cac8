//! Client configuration.

use std::path::PathBuf;

/// Settings for reaching (and if needed, starting) the imaged daemon.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding the daemon's API socket and pidfile.
    pub run_dir: PathBuf,

    /// Daemon binary, used when the daemon must be started on demand.
    pub daemon_bin: PathBuf,

    /// Well-known service name the daemon registers under.
    pub service_name: String,
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// the platform defaults.
    pub fn from_env() -> Self {
        let run_dir = std::env::var("IMAGED_RUN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/run/imaged"));

        let daemon_bin = std::env::var("IMAGED_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/usr/bin/imaged"));

        let service_name =
            std::env::var("IMAGED_SERVICE").unwrap_or_else(|_| "imaged".to_string());

        Self {
            run_dir,
            daemon_bin,
            service_name,
        }
    }
}
