//! CLI entrypoint for the end-to-end fixture orchestrator.
//!
//! The binary delegates to [`fleet_cli::run`], which parses arguments,
//! installs telemetry, and drives the requested fleet command.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    fleet_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
