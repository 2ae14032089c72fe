//! Fleet members, their groups, and the lifecycle modes selecting them.

use std::collections::BTreeSet;
use std::fmt;

use camino::Utf8PathBuf;

/// Command-line fragment identifying the reverse proxy master process.
pub const PROXY_PATTERN: &str = "nginx: master";
/// Command-line fragment identifying the device simulator.
pub const SIMULATOR_PATTERN: &str = "runModbusTCP";
/// Command-line fragment identifying gateway instances.
pub const GATEWAY_PATTERN: &str = "modbus2mqtt";
/// Command-line fragment identifying the broker.
pub const BROKER_PATTERN: &str = "mosquitto";

/// Lifetime class of a fleet member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerGroup {
    /// Stays up across restarts of the restartable group.
    Permanent,
    /// Torn down and relaunched independently.
    Restartable,
}

impl fmt::Display for ServerGroup {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => formatter.write_str("permanent"),
            Self::Restartable => formatter.write_str("restartable"),
        }
    }
}

/// Which part of the fleet a lifecycle invocation operates on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleMode {
    /// Both groups.
    #[default]
    Full,
    /// Reverse proxy and device simulator only.
    PermanentOnly,
    /// Broker and gateway instances only.
    RestartOnly,
}

impl LifecycleMode {
    /// Maps the `--permanent` / `--restart` flags onto a mode.
    ///
    /// `--restart` wins when both are given: the restartable set is what gets
    /// reaped and spawned in that case.
    pub const fn from_flags(permanent: bool, restart: bool) -> Self {
        match (permanent, restart) {
            (_, true) => Self::RestartOnly,
            (true, false) => Self::PermanentOnly,
            (false, false) => Self::Full,
        }
    }

    /// Returns true when servers of `group` take part in this mode.
    pub const fn includes(self, group: ServerGroup) -> bool {
        match (self, group) {
            (Self::Full, _) => true,
            (Self::PermanentOnly, ServerGroup::Permanent) => true,
            (Self::RestartOnly, ServerGroup::Restartable) => true,
            (Self::PermanentOnly, ServerGroup::Restartable)
            | (Self::RestartOnly, ServerGroup::Permanent) => false,
        }
    }

    /// Gateways run the freshly built backend, so every mode that launches
    /// them needs a build first.
    pub const fn requires_build(self) -> bool {
        self.includes(ServerGroup::Restartable)
    }
}

impl fmt::Display for LifecycleMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => formatter.write_str("full"),
            Self::PermanentOnly => formatter.write_str("permanent"),
            Self::RestartOnly => formatter.write_str("restart"),
        }
    }
}

/// What a fleet member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// HTTP reverse proxy.
    ReverseProxy,
    /// Modbus-TCP device simulator.
    DeviceSimulator,
    /// MQTT broker.
    Broker,
    /// Gateway process under test.
    Gateway {
        /// HTTP port passed as the first launch argument.
        port: u16,
        /// Whether the instance simulates an ingress deployment.
        ingress: bool,
    },
}

/// Destination of a fleet member's stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Appended to the shared capture file.
    SharedCapture,
    /// Written to a file of its own, replacing any previous file.
    Dedicated(Utf8PathBuf),
}

/// Static description of one fleet member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    /// Human-readable name used in logs and errors.
    pub name: String,
    /// What the member is.
    pub role: ServerRole,
    /// Program followed by its arguments.
    pub launch_command: Vec<String>,
    /// Where output goes.
    pub log: LogTarget,
    /// Ports the member binds once it is up.
    pub ports: BTreeSet<u16>,
    /// Lifetime class.
    pub group: ServerGroup,
    /// Command-line fragment used to find orphaned instances.
    pub reap_pattern: &'static str,
}

impl ServerSpec {
    /// Program to execute.
    pub fn program(&self) -> &str {
        self.launch_command.first().map_or("", String::as_str)
    }

    /// Arguments following the program.
    pub fn arguments(&self) -> &[String] {
        self.launch_command.get(1..).unwrap_or_default()
    }
}
