//! Command-line options and the resolved fleet configuration.

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Args;
use thiserror::Error;

use crate::defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_PORT_RETRIES, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PROBE_HOST,
    DEFAULT_PROXY_BINARY, default_build_command, default_log_format, default_mime_types,
    default_proxy_lib_dir,
};
use crate::fleet::{
    BROKER_PATTERN, GATEWAY_PATTERN, LifecycleMode, LogTarget, PROXY_PATTERN, SIMULATOR_PATTERN,
    ServerGroup, ServerRole, ServerSpec,
};
use crate::logging::LogFormat;
use crate::paths::FleetPaths;
use crate::ports::PortTable;

/// Flags shared by every `fleet` command.
///
/// Each flag falls back to a `FLEET_*` environment variable so CI jobs can
/// configure the fixtures without touching the invocation.
#[derive(Debug, Clone, Args)]
pub struct FleetOptions {
    /// Root of the gateway checkout holding the `e2e/servers` fixtures.
    #[arg(long, env = "FLEET_PROJECT_ROOT", value_name = "DIR")]
    pub project_root: Option<Utf8PathBuf>,
    /// Host probed while waiting for fleet ports.
    #[arg(long, env = "FLEET_PROBE_HOST", default_value = DEFAULT_PROBE_HOST)]
    pub host: String,
    /// Probe attempts per port before giving up on it.
    #[arg(long, env = "FLEET_MAX_PORT_RETRIES", default_value_t = DEFAULT_MAX_PORT_RETRIES)]
    pub max_port_retries: u32,
    /// Seconds between two probes of the same port.
    #[arg(long, env = "FLEET_POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,
    /// Reverse proxy executable.
    #[arg(long, env = "FLEET_PROXY_BINARY", default_value = DEFAULT_PROXY_BINARY)]
    pub proxy_binary: String,
    /// Library directory the reverse proxy needs at runtime.
    #[arg(long, env = "FLEET_PROXY_LIB_DIR", value_name = "DIR")]
    pub proxy_lib_dir: Option<Utf8PathBuf>,
    /// MIME-types table substituted into the proxy configuration.
    #[arg(long, env = "FLEET_MIME_TYPES", value_name = "FILE")]
    pub mime_types: Option<Utf8PathBuf>,
    /// Tracing filter expression.
    #[arg(long, env = "FLEET_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
    /// Tracing output format (`json` or `compact`).
    #[arg(long, env = "FLEET_LOG_FORMAT", default_value_t = default_log_format())]
    pub log_format: LogFormat,
}

/// Errors raised while resolving [`FleetOptions`] into a [`FleetConfig`].
#[derive(Debug, Error)]
pub enum FleetConfigError {
    /// The working directory could not be determined.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    /// The working directory is not valid UTF-8.
    #[error("project root {path:?} is not valid UTF-8")]
    NonUtf8Root {
        /// Offending directory.
        path: std::path::PathBuf,
    },
}

/// Fleet configuration constructed once per process and passed by reference
/// into every lifecycle component.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Artefact layout under the project root.
    pub paths: FleetPaths,
    /// Listening ports of every member.
    pub ports: PortTable,
    /// Host probed for readiness.
    pub probe_host: String,
    /// Probe attempts per port.
    pub max_port_retries: u32,
    /// Pause between probes of the same port.
    pub poll_interval: Duration,
    /// Reverse proxy executable.
    pub proxy_binary: String,
    /// Library directory the reverse proxy requires.
    pub proxy_lib_dir: Utf8PathBuf,
    /// MIME-types table substituted into the proxy template.
    pub mime_types: Utf8PathBuf,
    /// Backend build run before gateways are launched.
    pub build_command: Vec<String>,
    /// Tracing filter expression.
    pub log_filter: String,
    /// Tracing output format.
    pub log_format: LogFormat,
}

impl FleetConfig {
    /// Builds a configuration with default settings for `root`.
    pub fn for_project_root(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            paths: FleetPaths::new(root),
            ports: PortTable::default(),
            probe_host: String::from(DEFAULT_PROBE_HOST),
            max_port_retries: DEFAULT_MAX_PORT_RETRIES,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            proxy_binary: String::from(DEFAULT_PROXY_BINARY),
            proxy_lib_dir: default_proxy_lib_dir(),
            mime_types: default_mime_types(),
            build_command: default_build_command(),
            log_filter: String::from(DEFAULT_LOG_FILTER),
            log_format: default_log_format(),
        }
    }

    /// Resolves parsed options, defaulting the project root to the working
    /// directory.
    pub fn from_options(options: &FleetOptions) -> Result<Self, FleetConfigError> {
        let root = match &options.project_root {
            Some(root) => root.clone(),
            None => current_dir_utf8()?,
        };
        let mut config = Self::for_project_root(root);
        config.probe_host.clone_from(&options.host);
        config.max_port_retries = options.max_port_retries;
        config.poll_interval = Duration::from_secs(options.poll_interval_secs);
        config.proxy_binary.clone_from(&options.proxy_binary);
        if let Some(lib_dir) = &options.proxy_lib_dir {
            config.proxy_lib_dir.clone_from(lib_dir);
        }
        if let Some(mime_types) = &options.mime_types {
            config.mime_types.clone_from(mime_types);
        }
        config.log_filter.clone_from(&options.log_filter);
        config.log_format = options.log_format;
        Ok(config)
    }

    /// Every fleet member in launch order.
    pub fn servers(&self) -> Vec<ServerSpec> {
        let paths = &self.paths;
        let ports = &self.ports;
        let mut servers = vec![
            ServerSpec {
                name: String::from("reverse-proxy"),
                role: ServerRole::ReverseProxy,
                launch_command: vec![
                    self.proxy_binary.clone(),
                    String::from("-c"),
                    paths.rendered_proxy_config().into_string(),
                    String::from("-p"),
                    paths.root().to_string(),
                ],
                log: LogTarget::SharedCapture,
                ports: BTreeSet::from([ports.proxy]),
                group: ServerGroup::Permanent,
                reap_pattern: PROXY_PATTERN,
            },
            ServerSpec {
                name: String::from("device-simulator"),
                role: ServerRole::DeviceSimulator,
                launch_command: shell_command(paths.simulator_script().into_string()),
                log: LogTarget::SharedCapture,
                ports: BTreeSet::from([ports.simulator]),
                group: ServerGroup::Permanent,
                reap_pattern: SIMULATOR_PATTERN,
            },
            ServerSpec {
                name: String::from("broker"),
                role: ServerRole::Broker,
                launch_command: shell_command(paths.broker_script().into_string()),
                log: LogTarget::SharedCapture,
                ports: BTreeSet::from([ports.broker, ports.broker_no_auth]),
                group: ServerGroup::Restartable,
                reap_pattern: BROKER_PATTERN,
            },
        ];
        for (port, ingress) in [
            (ports.gateway, false),
            (ports.gateway_ingress, true),
            (ports.gateway_no_auth, false),
        ] {
            servers.push(self.gateway(port, ingress));
        }
        servers
    }

    /// Members taking part in `mode`, in launch order.
    pub fn servers_for(&self, mode: LifecycleMode) -> Vec<ServerSpec> {
        self.servers()
            .into_iter()
            .filter(|server| mode.includes(server.group))
            .collect()
    }

    /// Ports awaited for `mode`: the permanent group's ports in ascending
    /// order, followed by the restartable group's.
    pub fn port_set(&self, mode: LifecycleMode) -> Vec<u16> {
        let servers = self.servers();
        [ServerGroup::Permanent, ServerGroup::Restartable]
            .into_iter()
            .filter(|group| mode.includes(*group))
            .flat_map(|group| {
                servers
                    .iter()
                    .filter(move |server| server.group == group)
                    .flat_map(|server| server.ports.iter().copied())
                    .collect::<BTreeSet<_>>()
            })
            .collect()
    }

    fn gateway(&self, port: u16, ingress: bool) -> ServerSpec {
        let mut script = format!("{} {port}", self.paths.gateway_script());
        if ingress {
            script.push_str(" ingress");
        }
        let name = if ingress {
            format!("gateway-{port}-ingress")
        } else {
            format!("gateway-{port}")
        };
        ServerSpec {
            name,
            role: ServerRole::Gateway { port, ingress },
            launch_command: shell_command(script),
            log: LogTarget::Dedicated(self.paths.gateway_log(port)),
            ports: BTreeSet::from([port]),
            group: ServerGroup::Restartable,
            reap_pattern: GATEWAY_PATTERN,
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self::for_project_root(".")
    }
}

fn shell_command(script: String) -> Vec<String> {
    vec![String::from("sh"), String::from("-c"), script]
}

fn current_dir_utf8() -> Result<Utf8PathBuf, FleetConfigError> {
    let dir = env::current_dir().map_err(FleetConfigError::CurrentDir)?;
    Utf8PathBuf::from_path_buf(dir).map_err(|path| FleetConfigError::NonUtf8Root { path })
}
