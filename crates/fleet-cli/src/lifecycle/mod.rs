//! Lifecycle management for the end-to-end server fleet.
//!
//! This module is split into focused submodules so each concern remains small and
//! testable:
//! - [`types`] defines the command models and IO helpers.
//! - [`error`] captures the error surface exposed to the CLI.
//! - [`host`] is the seam through which processes are run, spawned, and signalled.
//! - [`ports`] polls fleet ports until they accept connections.
//! - [`launcher`] prepares the host and spawns fleet members.
//! - [`reaper`] terminates members and removes their artefacts.
//! - [`utils`] houses filesystem and environment helpers.
//! - [`controller`] implements the high-level start/restart/kill flows.

mod controller;
mod error;
mod host;
mod launcher;
mod ports;
mod reaper;
mod types;
mod utils;

pub use controller::FleetLifecycle;
pub use error::{LifecycleError, Prerequisite};
pub use host::{CommandLine, CommandOutcome, ProcessHandle, ProcessHost, SystemHost};
pub use launcher::{LaunchedFleet, Launcher};
pub use ports::{PortProbe, PortWaiter, RetryPolicy, TcpProbe};
pub use reaper::{CleanupIssue, ReapReport, Reaper};
pub use types::{LifecycleCommand, LifecycleInvocation, LifecycleOutput};
