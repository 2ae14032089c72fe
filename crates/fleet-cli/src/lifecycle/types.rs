//! Lifecycle command types and output abstractions.
//!
//! Defines the payloads and IO wrappers shared across lifecycle commands so the
//! controller can remain agnostic of concrete writers.

use std::fmt;
use std::io::Write;

use fleet_config::LifecycleMode;

use super::LifecycleError;

/// Supported lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Start,
    Restart,
    Kill,
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => formatter.write_str("start"),
            Self::Restart => formatter.write_str("restart"),
            Self::Kill => formatter.write_str("kill"),
        }
    }
}

/// Invocation payload forwarded from the CLI runtime.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleInvocation {
    pub command: LifecycleCommand,
    pub mode: LifecycleMode,
}

/// Output handle abstracting over stdout/stderr writers.
pub struct LifecycleOutput<W: Write, E: Write> {
    pub stdout: W,
    pub stderr: E,
}

impl<W: Write, E: Write> LifecycleOutput<W, E> {
    pub fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stdout.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stdout.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stdout.flush().map_err(LifecycleError::Io)
    }

    pub fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stderr.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stderr.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stderr.flush().map_err(LifecycleError::Io)
    }

    /// Opens a collapsible CI log group.
    pub fn begin_group(&mut self, title: &str) -> Result<(), LifecycleError> {
        self.stdout_line(format_args!("::group::{title}"))
    }

    /// Closes the innermost CI log group.
    pub fn end_group(&mut self) -> Result<(), LifecycleError> {
        self.stdout_line(format_args!("::endgroup::"))
    }
}
