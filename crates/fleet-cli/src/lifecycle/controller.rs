//! High-level orchestration for fleet lifecycle commands.
//!
//! This module wires the reaper, the launcher, and the port waiter together
//! so the CLI drives a single entrypoint for start, restart, and kill.

use std::io::Write;

use fleet_config::{FleetConfig, LifecycleMode};
use tracing::{info, info_span, warn};

use super::error::LifecycleError;
use super::host::ProcessHost;
use super::launcher::{LaunchedFleet, Launcher};
use super::ports::{PortProbe, PortWaiter, RetryPolicy};
use super::reaper::{ReapReport, Reaper};
use super::types::{LifecycleCommand, LifecycleInvocation, LifecycleOutput};
use super::utils::remove_if_exists;

/// Lifecycle controller over a process host and a port probe.
pub struct FleetLifecycle<'a, H: ProcessHost, P: PortProbe> {
    config: &'a FleetConfig,
    host: H,
    probe: P,
}

impl<'a, H: ProcessHost, P: PortProbe> FleetLifecycle<'a, H, P> {
    pub fn new(config: &'a FleetConfig, host: H, probe: P) -> Self {
        Self {
            config,
            host,
            probe,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn handle<W: Write, E: Write>(
        &mut self,
        invocation: LifecycleInvocation,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<(), LifecycleError> {
        match invocation.command {
            LifecycleCommand::Start => self.run(invocation.mode, false, output).map(drop),
            LifecycleCommand::Restart => self.run(invocation.mode, true, output).map(drop),
            LifecycleCommand::Kill => self.reap(invocation.mode, output).map(drop),
        }
    }

    /// Brings the fleet selected by `mode` up from a clean slate.
    ///
    /// Any running members of `mode` are reaped first, then the fleet is
    /// launched and every port of the mode is awaited. On success the shared
    /// capture file is removed; on a port timeout it is kept for inspection
    /// and the members are left running.
    ///
    /// # Errors
    ///
    /// Propagates launch failures and [`LifecycleError::PortTimeout`].
    pub fn run<W: Write, E: Write>(
        &mut self,
        mode: LifecycleMode,
        is_restart: bool,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<LaunchedFleet, LifecycleError> {
        let _span = info_span!("fleet_run", %mode, is_restart).entered();
        info!(
            action = if is_restart { "restart" } else { "start" },
            "bringing fleet up"
        );
        self.reap(mode, output)?;
        let fleet = Launcher::new(self.config, &mut self.host).launch(mode, output)?;

        let capture = self.config.paths.capture_file();
        let ports = self.config.port_set(mode);
        let waiter = PortWaiter::new(&self.config.probe_host, RetryPolicy::from(self.config))
            .with_capture_file(&capture);
        output.begin_group("Wait for required ports")?;
        let waited = waiter.await_ports(&mut self.probe, &ports, output);
        output.end_group()?;
        waited?;

        if let Err(error) = remove_if_exists(&capture) {
            warn!(path = %capture, error = %error, "failed to remove capture file");
        }
        info!(servers = fleet.handles.len(), "fleet is up");
        Ok(fleet)
    }

    /// Reaps every member of `mode`; see [`Reaper::reap`].
    pub fn reap<W: Write, E: Write>(
        &mut self,
        mode: LifecycleMode,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ReapReport, LifecycleError> {
        Reaper::new(self.config, &mut self.host).reap(mode, output)
    }

    /// Terminates the members of a previous launch by handle.
    pub fn shutdown(&mut self, fleet: &LaunchedFleet) -> ReapReport {
        Reaper::new(self.config, &mut self.host).reap_handles(&fleet.handles)
    }
}
