//! External tool invocations outside the fleet lifecycle.
//!
//! `fleet test` runs the backend unit tests followed by the browser tests.
//! Both stream their output straight to the terminal so CI logs show progress
//! as it happens.

use std::io::Write;

use fleet_config::FleetConfig;
use tracing::info;

use crate::errors::AppError;
use crate::lifecycle::{CommandLine, LifecycleOutput, ProcessHost};

/// Runs `command` with inherited streams and fails unless it exits zero.
pub(crate) fn run_tool<H: ProcessHost>(
    host: &mut H,
    command: &CommandLine,
) -> Result<(), AppError> {
    let rendered = command.to_string();
    info!(command = %rendered, "running tool");
    let outcome = host
        .stream(command)
        .map_err(|source| AppError::SpawnTool {
            command: rendered.clone(),
            source,
        })?;
    if outcome.success() {
        return Ok(());
    }
    Err(AppError::ToolFailed {
        command: rendered,
        status: outcome.code,
    })
}

/// Runs the unit tests, then the browser tests when an `e2e` directory
/// exists under the project root.
pub(crate) fn run_test_suite<H, W, E>(
    config: &FleetConfig,
    host: &mut H,
    output: &mut LifecycleOutput<W, E>,
) -> Result<(), AppError>
where
    H: ProcessHost,
    W: Write,
    E: Write,
{
    let root = config.paths.root();
    output.begin_group("Unit tests")?;
    let unit = run_tool(
        host,
        &CommandLine::new("npm").args(["run", "test"]).current_dir(root),
    );
    output.end_group()?;
    unit?;

    if !config.paths.e2e_dir().is_dir() {
        output.stderr_line(format_args!("No e2e tests found in {root}"))?;
        return Ok(());
    }
    output.begin_group("Browser tests")?;
    let browser = run_tool(
        host,
        &CommandLine::new("npx")
            .args(["playwright", "test"])
            .current_dir(root),
    );
    output.end_group()?;
    browser
}
