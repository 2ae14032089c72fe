//! Gateway container management for runs against a published image.

use std::io::Write;

use tracing::{debug, info};

use crate::errors::AppError;
use crate::lifecycle::{CommandLine, LifecycleOutput, ProcessHost};
use crate::tooling::run_tool;

/// Name given to the gateway container so later runs can find it.
pub(crate) const CONTAINER_NAME: &str = "modbus2mqtt-e2e";

/// Pulls `image` and starts it detached on the host network, replacing any
/// container left by an earlier run.
pub(crate) fn start_container<H, W, E>(
    host: &mut H,
    image: &str,
    output: &mut LifecycleOutput<W, E>,
) -> Result<(), AppError>
where
    H: ProcessHost,
    W: Write,
    E: Write,
{
    remove_container(host, output)?;
    output.begin_group("Start gateway container")?;
    let started = run_tool(host, &CommandLine::new("docker").args(["pull", image])).and_then(
        |()| {
            run_tool(
                host,
                &CommandLine::new("docker").args([
                    "run",
                    "--detach",
                    "--name",
                    CONTAINER_NAME,
                    "--network",
                    "host",
                    image,
                ]),
            )
        },
    );
    output.end_group()?;
    started?;
    info!(image, container = CONTAINER_NAME, "gateway container started");
    output.stdout_line(format_args!("Started {CONTAINER_NAME} from {image}"))?;
    Ok(())
}

/// Removes the gateway container. A missing container, or a host without
/// docker, is not an error.
pub(crate) fn remove_container<H, W, E>(
    host: &mut H,
    output: &mut LifecycleOutput<W, E>,
) -> Result<(), AppError>
where
    H: ProcessHost,
    W: Write,
    E: Write,
{
    let command = CommandLine::new("docker").args(["rm", "--force", CONTAINER_NAME]);
    match host.run(&command) {
        Ok(outcome) if outcome.success() => {
            output.stdout_line(format_args!("Removed container {CONTAINER_NAME}"))?;
        }
        Ok(outcome) => {
            debug!(stderr = %outcome.stderr.trim_end(), "no gateway container to remove");
        }
        Err(error) => debug!(error = %error, "docker unavailable; skipping container removal"),
    }
    Ok(())
}
