//! Runtime for the `fleet` end-to-end fixture orchestrator.
//!
//! The binary reaps leftover fixture servers, rebuilds the backend, starts the
//! reverse proxy, device simulator, broker, and gateway instances the browser
//! tests talk to, and blocks until every one of their ports accepts
//! connections. It also wraps the test suites and the gateway container so CI
//! drives everything through one entrypoint.

mod cli;
mod docker;
mod errors;
pub mod lifecycle;
pub mod telemetry;
mod tooling;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use fleet_config::FleetConfig;
use tracing::error;

use crate::cli::{Cli, FleetCommand};
use crate::errors::AppError;
use crate::lifecycle::{
    FleetLifecycle, LifecycleInvocation, LifecycleOutput, PortProbe, ProcessHost, SystemHost,
    TcpProbe,
};

/// Exit status for every failure, including argument errors.
const FAILURE_EXIT_CODE: u8 = 2;

struct CliRunner<'a, W: Write, E: Write> {
    stdout: &'a mut W,
    stderr: &'a mut E,
    telemetry: bool,
}

impl<'a, W: Write, E: Write> CliRunner<'a, W, E> {
    fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self {
            stdout,
            stderr,
            telemetry: true,
        }
    }

    #[cfg(test)]
    fn without_telemetry(mut self) -> Self {
        self.telemetry = false;
        self
    }

    fn run<I, H, P>(&mut self, args: I, host: H, probe: P) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        H: ProcessHost,
        P: PortProbe,
    {
        match self.execute(args, host, probe) {
            Ok(()) => ExitCode::SUCCESS,
            Err(AppError::CliUsage(usage)) if !usage.use_stderr() => {
                let _ = write!(self.stdout, "{usage}");
                ExitCode::SUCCESS
            }
            Err(AppError::CliUsage(usage)) => {
                let _ = write!(self.stderr, "{usage}");
                ExitCode::from(FAILURE_EXIT_CODE)
            }
            Err(failure) => {
                error!(error = %failure, "fleet command failed");
                let _ = writeln!(self.stderr, "{failure}");
                ExitCode::from(FAILURE_EXIT_CODE)
            }
        }
    }

    fn execute<I, H, P>(&mut self, args: I, mut host: H, probe: P) -> Result<(), AppError>
    where
        I: IntoIterator<Item = OsString>,
        H: ProcessHost,
        P: PortProbe,
    {
        let cli = Cli::try_parse_from(args).map_err(AppError::CliUsage)?;
        let config = FleetConfig::from_options(&cli.fleet)?;
        if self.telemetry {
            telemetry::initialise(&config)?;
        }
        let mut output = LifecycleOutput::new(&mut *self.stdout, &mut *self.stderr);

        if let Some(command) = cli.command.lifecycle() {
            let mut lifecycle = FleetLifecycle::new(&config, host, probe);
            lifecycle.handle(
                LifecycleInvocation {
                    command,
                    mode: cli.mode(),
                },
                &mut output,
            )?;
            if cli.command == FleetCommand::KillServers {
                docker::remove_container(lifecycle.host_mut(), &mut output)?;
            }
            return Ok(());
        }
        match cli.command {
            FleetCommand::Test => tooling::run_test_suite(&config, &mut host, &mut output),
            FleetCommand::StartDocker => {
                docker::start_container(&mut host, &cli.docker_image, &mut output)
            }
            FleetCommand::StartServers
            | FleetCommand::RestartServers
            | FleetCommand::KillServers => Ok(()),
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    CliRunner::new(stdout, stderr).run(args, SystemHost::default(), TcpProbe::default())
}

#[cfg(test)]
mod tests;
