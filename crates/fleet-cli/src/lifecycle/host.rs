//! Process execution seam between the lifecycle and the operating system.
//!
//! Every external program the orchestrator touches (the backend build, the
//! fleet members, the process lister) goes through [`ProcessHost`], so the
//! lifecycle can be exercised against a fake host in tests.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use fleet_config::ServerSpec;
use tracing::debug;

/// Program, arguments, and working directory of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: OsString,
    arguments: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl CommandLine {
    /// Starts a command line for `program`.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            arguments: Vec::new(),
            current_dir: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, argument: impl Into<OsString>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Runs the command from `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Builds the launch command of a fleet member, run from `root`.
    pub fn for_server(server: &ServerSpec, root: impl AsRef<Path>) -> Self {
        Self::new(server.program())
            .args(server.arguments())
            .current_dir(root)
    }

    /// Program to execute.
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments following the program.
    pub fn arguments(&self) -> &[OsString] {
        &self.arguments
    }

    /// Working directory, if one was set.
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.arguments);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.program.to_string_lossy())?;
        for argument in &self.arguments {
            write!(formatter, " {}", argument.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output (empty when streamed).
    pub stdout: String,
    /// Captured standard error (empty when streamed).
    pub stderr: String,
}

impl CommandOutcome {
    /// Outcome carrying only an exit code.
    pub const fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Returns true when the command exited with status zero.
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// A fleet member spawned by this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    /// Name of the fleet member.
    pub server: String,
    /// Operating-system process id.
    pub pid: u32,
}

/// Runs, spawns, and signals external processes.
pub trait ProcessHost {
    /// Runs a command to completion, capturing its output.
    fn run(&mut self, command: &CommandLine) -> io::Result<CommandOutcome>;

    /// Runs a command to completion with inherited standard streams.
    fn stream(&mut self, command: &CommandLine) -> io::Result<CommandOutcome>;

    /// Spawns a detached fleet member whose stdout and stderr go to `output`.
    fn spawn(
        &mut self,
        server: &ServerSpec,
        command: &CommandLine,
        output: File,
    ) -> io::Result<ProcessHandle>;

    /// Asks the process `pid` to terminate.
    fn terminate(&mut self, pid: u32) -> io::Result<()>;

    /// Pid of the orchestrator itself, never targeted by a reap.
    fn own_pid(&self) -> u32 {
        std::process::id()
    }
}

impl<H: ProcessHost + ?Sized> ProcessHost for &mut H {
    fn run(&mut self, command: &CommandLine) -> io::Result<CommandOutcome> {
        (**self).run(command)
    }

    fn stream(&mut self, command: &CommandLine) -> io::Result<CommandOutcome> {
        (**self).stream(command)
    }

    fn spawn(
        &mut self,
        server: &ServerSpec,
        command: &CommandLine,
        output: File,
    ) -> io::Result<ProcessHandle> {
        (**self).spawn(server, command, output)
    }

    fn terminate(&mut self, pid: u32) -> io::Result<()> {
        (**self).terminate(pid)
    }

    fn own_pid(&self) -> u32 {
        (**self).own_pid()
    }
}

/// [`ProcessHost`] backed by `std::process`.
///
/// Spawned members get a process group of their own so a terminal hang-up or
/// Ctrl-C aimed at the orchestrator does not reach them. Their [`Child`]
/// handles are kept so members terminated by handle can be waited on.
#[derive(Debug, Default)]
pub struct SystemHost {
    children: Vec<Child>,
}

impl ProcessHost for SystemHost {
    fn run(&mut self, command: &CommandLine) -> io::Result<CommandOutcome> {
        let output = command.to_command().stdin(Stdio::null()).output()?;
        Ok(CommandOutcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn stream(&mut self, command: &CommandLine) -> io::Result<CommandOutcome> {
        let status = command.to_command().stdin(Stdio::null()).status()?;
        Ok(CommandOutcome {
            code: status.code(),
            ..CommandOutcome::default()
        })
    }

    fn spawn(
        &mut self,
        server: &ServerSpec,
        command: &CommandLine,
        output: File,
    ) -> io::Result<ProcessHandle> {
        let errors = output.try_clone()?;
        let mut process = command.to_command();
        process
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::from(errors));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            process.process_group(0);
        }
        let child = process.spawn()?;
        let pid = child.id();
        debug!(server = %server.name, pid, command = %command, "spawned fleet member");
        self.children.push(child);
        Ok(ProcessHandle {
            server: server.name.clone(),
            pid,
        })
    }

    fn terminate(&mut self, pid: u32) -> io::Result<()> {
        let Some(index) = self.children.iter().position(|child| child.id() == pid) else {
            return signal_process(pid, SignalTarget::Process);
        };
        // Members run in their own process group; signalling the group also
        // reaches the programs started by their `sh -c` wrapper.
        signal_process(pid, SignalTarget::Group)?;
        let mut child = self.children.swap_remove(index);
        child.wait().map(|_| ())
    }
}

/// Whether a signal addresses a single process or its whole process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalTarget {
    Process,
    Group,
}

/// Sends SIGTERM to `pid` or to the process group it leads.
///
/// Pid 0 and values outside `pid_t` are rejected: `kill(2)` would interpret
/// them as "the caller's process group" or wrap into a negative group id.
pub(crate) fn signal_process(pid: u32, target: SignalTarget) -> io::Result<()> {
    if pid == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "pid 0 addresses the caller's process group",
        ));
    }
    #[cfg(unix)]
    {
        let raw = libc::pid_t::try_from(pid).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("pid {pid} exceeds the platform pid range"),
            )
        })?;
        let raw = match target {
            SignalTarget::Process => raw,
            SignalTarget::Group => -raw,
        };
        // SAFETY: `kill(2)` is memory-safe for any pid value; invalid targets
        // are reported through errno.
        let result = unsafe { libc::kill(raw, libc::SIGTERM) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
    #[cfg(not(unix))]
    {
        let _ = target;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "platform does not support process signalling",
        ))
    }
}
