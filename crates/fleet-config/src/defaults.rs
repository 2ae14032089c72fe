use camino::{Utf8Path, Utf8PathBuf};

use crate::logging::LogFormat;

/// Host probed when waiting for fleet ports.
pub const DEFAULT_PROBE_HOST: &str = "localhost";

/// Probe attempts per port before the port is reported as never opened.
pub const DEFAULT_MAX_PORT_RETRIES: u32 = 60;

/// Seconds slept between two probes of the same port.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Reverse proxy executable resolved on `PATH`.
pub const DEFAULT_PROXY_BINARY: &str = "nginx";

/// Gateway image started by `fleet startdocker`.
pub const DEFAULT_DOCKER_IMAGE: &str = "ghcr.io/modbus2mqtt/modbus2mqtt:latest";

/// Ports bound by the permanent group (device simulator, reverse proxy).
pub const PERMANENT_PORTS: [u16; 2] = [3002, 3006];

/// Ports bound by the restartable group (broker, gateway instances).
pub const RESTART_PORTS: [u16; 5] = [3001, 3003, 3004, 3005, 3007];

const SYSTEM_MIME_TYPES: &str = "/etc/nginx/mime.types";
const HOMEBREW_MIME_TYPES: &str = "/opt/homebrew/etc/nginx/mime.types";
const SYSTEM_PROXY_LIB_DIR: &str = "/var/lib/nginx";
const HOMEBREW_PROXY_LIB_DIR: &str = "/opt/homebrew/var/homebrew/linked/nginx";

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Backend build invoked before the restartable group is launched.
pub fn default_build_command() -> Vec<String> {
    ["npm", "run", "build:backend"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Locates the MIME-types table shipped with the reverse proxy.
///
/// Linux packages install it under `/etc/nginx`; Homebrew installs keep it
/// below `/opt/homebrew`.
pub fn default_mime_types() -> Utf8PathBuf {
    first_existing(SYSTEM_MIME_TYPES, HOMEBREW_MIME_TYPES, |path| path.exists())
}

/// Locates the reverse proxy's library directory.
pub fn default_proxy_lib_dir() -> Utf8PathBuf {
    first_existing(SYSTEM_PROXY_LIB_DIR, HOMEBREW_PROXY_LIB_DIR, |path| {
        path.is_dir()
    })
}

fn first_existing(
    preferred: &str,
    fallback: &str,
    exists: impl Fn(&Utf8Path) -> bool,
) -> Utf8PathBuf {
    let preferred = Utf8PathBuf::from(preferred);
    if exists(&preferred) {
        preferred
    } else {
        Utf8PathBuf::from(fallback)
    }
}
