//! CLI argument definitions for the fleet orchestrator.

use clap::{Parser, ValueEnum};
use fleet_config::{DEFAULT_DOCKER_IMAGE, FleetOptions, LifecycleMode};

use crate::lifecycle::LifecycleCommand;

/// Command-line interface for the end-to-end fixture orchestrator.
#[derive(Parser, Debug)]
#[command(
    name = "fleet",
    version,
    about = "Starts, restarts, and stops the end-to-end test server fleet"
)]
pub(crate) struct Cli {
    /// What to do.
    #[arg(value_enum, default_value_t = FleetCommand::Test)]
    pub(crate) command: FleetCommand,
    /// Operate on the reverse proxy and device simulator only.
    #[arg(short, long)]
    pub(crate) permanent: bool,
    /// Operate on the broker and gateway instances only.
    #[arg(short, long)]
    pub(crate) restart: bool,
    /// Gateway image used by `startdocker`.
    #[arg(long, value_name = "IMAGE", default_value = DEFAULT_DOCKER_IMAGE)]
    pub(crate) docker_image: String,
    #[command(flatten)]
    pub(crate) fleet: FleetOptions,
}

impl Cli {
    pub(crate) const fn mode(&self) -> LifecycleMode {
        LifecycleMode::from_flags(self.permanent, self.restart)
    }
}

/// Top-level commands; names match the npm scripts that invoke them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum FleetCommand {
    /// Runs the unit tests, then the browser tests when present.
    Test,
    /// Reaps leftovers, then starts the fleet and waits for its ports.
    #[value(name = "startServers")]
    StartServers,
    /// Same as `startServers`, logged as a restart.
    #[value(name = "restartServers")]
    RestartServers,
    /// Reaps the fleet and removes the gateway container.
    #[value(name = "killServers")]
    KillServers,
    /// Pulls and starts the gateway container.
    #[value(name = "startdocker")]
    StartDocker,
}

impl FleetCommand {
    /// Lifecycle command this maps onto, if any.
    pub(crate) const fn lifecycle(self) -> Option<LifecycleCommand> {
        match self {
            Self::StartServers => Some(LifecycleCommand::Start),
            Self::RestartServers => Some(LifecycleCommand::Restart),
            Self::KillServers => Some(LifecycleCommand::Kill),
            Self::Test | Self::StartDocker => None,
        }
    }
}
