//! Static description of the end-to-end server fleet.
//!
//! The fleet is the set of auxiliary servers a browser-driven test run needs:
//! a reverse proxy and a Modbus-TCP device simulator (the permanent group),
//! plus an MQTT broker and three gateway instances (the restartable group).
//! This crate answers every question the orchestrator asks before it touches
//! the process table: which servers exist, how they are launched, which ports
//! they bind, and where their artefacts live under the project root.

mod config;
mod defaults;
mod fleet;
mod logging;
mod paths;
mod ports;

pub use config::{FleetConfig, FleetConfigError, FleetOptions};
pub use defaults::{
    DEFAULT_DOCKER_IMAGE, DEFAULT_LOG_FILTER, DEFAULT_MAX_PORT_RETRIES,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PROBE_HOST, DEFAULT_PROXY_BINARY, PERMANENT_PORTS,
    RESTART_PORTS, default_build_command, default_log_format, default_mime_types,
    default_proxy_lib_dir,
};
pub use fleet::{
    BROKER_PATTERN, GATEWAY_PATTERN, LifecycleMode, LogTarget, PROXY_PATTERN, SIMULATOR_PATTERN,
    ServerGroup, ServerRole, ServerSpec,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::FleetPaths;
pub use ports::PortTable;
