//! Error types for the CLI runtime.

use std::io;

use fleet_config::FleetConfigError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to resolve configuration: {0}")]
    Configuration(#[from] FleetConfigError),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to run `{command}`: {source}")]
    SpawnTool {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed (exit status: {status:?})")]
    ToolFailed {
        command: String,
        status: Option<i32>,
    },
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
}
