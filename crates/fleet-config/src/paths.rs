//! Derives fixture artefact paths from the project root.
//!
//! The launcher writes logs and the rendered proxy configuration below the
//! project root, and the reaper removes the transient files again. Both need
//! to agree on the layout, so every path is computed here.

use camino::{Utf8Path, Utf8PathBuf};

const STALE_PACKAGE_PREFIX: &str = "modbus2mqtt-";
const STALE_PACKAGE_SUFFIX: &str = ".tgz";

/// Canonical paths for fixture artefacts under a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetPaths {
    root: Utf8PathBuf,
    servers_dir: Utf8PathBuf,
    log_dir: Utf8PathBuf,
}

impl FleetPaths {
    /// Derives the artefact layout for the given project root.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        let servers_dir = root.join("e2e").join("servers");
        let log_dir = servers_dir.join("logs");
        Self {
            root,
            servers_dir,
            log_dir,
        }
    }

    /// Project root; the reverse proxy uses it as its prefix directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory holding the browser tests and fixture scripts.
    pub fn e2e_dir(&self) -> Utf8PathBuf {
        self.root.join("e2e")
    }

    /// Directory receiving per-instance gateway logs.
    pub fn log_dir(&self) -> &Utf8Path {
        &self.log_dir
    }

    /// Shared capture file for the permanent group's output.
    pub fn capture_file(&self) -> Utf8PathBuf {
        self.root.join("stderr.out")
    }

    /// Reverse proxy configuration template containing the MIME-types token.
    pub fn proxy_template(&self) -> Utf8PathBuf {
        self.servers_dir.join("nginx.conf").join("nginx.conf")
    }

    /// Rendered reverse proxy configuration handed to the proxy binary.
    pub fn rendered_proxy_config(&self) -> Utf8PathBuf {
        self.root.join("nginx.conf")
    }

    /// Pid file written by the reverse proxy master process.
    pub fn proxy_pid_file(&self) -> Utf8PathBuf {
        self.root.join("nginx.pid")
    }

    /// Error log written by the reverse proxy.
    pub fn proxy_error_log(&self) -> Utf8PathBuf {
        self.root.join("nginx.error.log")
    }

    /// Symlink to the proxy error log inside the log directory.
    pub fn proxy_error_log_link(&self) -> Utf8PathBuf {
        self.log_dir.join("nginx.error.log")
    }

    /// Output left behind by detached processes started outside a log sink.
    pub fn leftover_output(&self) -> Utf8PathBuf {
        self.root.join("nohup.out")
    }

    /// Previous distribution build.
    pub fn dist_dir(&self) -> Utf8PathBuf {
        self.root.join("distprod")
    }

    /// Log file for the gateway instance listening on `port`.
    pub fn gateway_log(&self, port: u16) -> Utf8PathBuf {
        self.log_dir.join(format!("modbus2mqtt_{port}.log"))
    }

    /// Launcher script for the Modbus-TCP device simulator.
    pub fn simulator_script(&self) -> Utf8PathBuf {
        self.servers_dir.join("modbustcp")
    }

    /// Launcher script for the MQTT broker.
    pub fn broker_script(&self) -> Utf8PathBuf {
        self.servers_dir.join("mosquitto")
    }

    /// Launcher script for a gateway instance.
    pub fn gateway_script(&self) -> Utf8PathBuf {
        self.servers_dir.join("modbus2mqtt")
    }

    /// Returns true when `file_name` is a packaged archive from an earlier build.
    pub fn is_stale_package(file_name: &str) -> bool {
        file_name.starts_with(STALE_PACKAGE_PREFIX) && file_name.ends_with(STALE_PACKAGE_SUFFIX)
    }
}
