//! In-memory process host that stands in for the real fleet.
//!
//! Spawning a member binds real TCP listeners on its ports, so the production
//! [`TcpProbe`](crate::lifecycle::TcpProbe) sees the fake fleet come up.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Write};
use std::net::TcpListener;

use fleet_config::ServerSpec;

use crate::lifecycle::{CommandLine, CommandOutcome, ProcessHandle, ProcessHost};

const FIRST_FAKE_PID: u32 = 40_000;

#[derive(Debug)]
pub(crate) struct FakeHost {
    /// Rendered command lines passed to `run` and `stream`.
    pub runs: Vec<String>,
    /// Names of spawned members in spawn order.
    pub spawned: Vec<String>,
    /// Pids passed to `terminate`.
    pub terminated: Vec<u32>,
    /// Exit code returned for every non-`pgrep` command.
    pub exit_code: i32,
    /// Stderr returned for failing commands.
    pub failure_stderr: String,
    silent_ports: BTreeSet<u16>,
    running: BTreeMap<u32, Member>,
    next_pid: u32,
    own_pid: u32,
}

#[derive(Debug)]
struct Member {
    command_line: String,
    _listeners: Vec<TcpListener>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            runs: Vec::new(),
            spawned: Vec::new(),
            terminated: Vec::new(),
            exit_code: 0,
            failure_stderr: String::new(),
            silent_ports: BTreeSet::new(),
            running: BTreeMap::new(),
            next_pid: FIRST_FAKE_PID,
            own_pid: std::process::id(),
        }
    }
}

impl FakeHost {
    /// Host whose commands all exit with `code` and print `stderr`.
    pub(crate) fn failing(code: i32, stderr: &str) -> Self {
        Self {
            exit_code: code,
            failure_stderr: stderr.to_owned(),
            ..Self::default()
        }
    }

    /// Members spawned with `port` never bind it.
    pub(crate) fn never_bind(&mut self, port: u16) {
        self.silent_ports.insert(port);
    }

    /// Registers a process that looks like a leftover from an earlier run.
    pub(crate) fn seed_process(&mut self, command_line: &str) -> u32 {
        let pid = self.allocate_pid();
        self.running.insert(
            pid,
            Member {
                command_line: command_line.to_owned(),
                _listeners: Vec::new(),
            },
        );
        pid
    }

    /// Makes `pgrep` report the orchestrator itself for `command_line`.
    pub(crate) fn seed_own_process(&mut self, command_line: &str) {
        self.running.insert(
            self.own_pid,
            Member {
                command_line: command_line.to_owned(),
                _listeners: Vec::new(),
            },
        );
    }

    pub(crate) fn is_running(&self, pid: u32) -> bool {
        self.running.contains_key(&pid)
    }

    pub(crate) fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Commands run through the host whose program is `program`.
    pub(crate) fn runs_of(&self, program: &str) -> Vec<&str> {
        self.runs
            .iter()
            .filter(|line| line.split(' ').next() == Some(program))
            .map(String::as_str)
            .collect()
    }

    fn allocate_pid(&mut self) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    fn pgrep(&self, command: &CommandLine) -> CommandOutcome {
        let pattern = command
            .arguments()
            .last()
            .map(|argument| argument.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pids: Vec<String> = self
            .running
            .iter()
            .filter(|(_, member)| member.command_line.contains(&pattern))
            .map(|(pid, _)| pid.to_string())
            .collect();
        if pids.is_empty() {
            return CommandOutcome::with_code(1);
        }
        CommandOutcome {
            code: Some(0),
            stdout: format!("{}\n", pids.join("\n")),
            stderr: String::new(),
        }
    }

    fn outcome(&self) -> CommandOutcome {
        CommandOutcome {
            code: Some(self.exit_code),
            stdout: String::new(),
            stderr: if self.exit_code == 0 {
                String::new()
            } else {
                self.failure_stderr.clone()
            },
        }
    }
}

impl ProcessHost for FakeHost {
    fn run(&mut self, command: &CommandLine) -> io::Result<CommandOutcome> {
        self.runs.push(command.to_string());
        if command.program() == "pgrep" {
            return Ok(self.pgrep(command));
        }
        Ok(self.outcome())
    }

    fn stream(&mut self, command: &CommandLine) -> io::Result<CommandOutcome> {
        self.runs.push(command.to_string());
        let mut outcome = self.outcome();
        outcome.stderr.clear();
        Ok(outcome)
    }

    fn spawn(
        &mut self,
        server: &ServerSpec,
        command: &CommandLine,
        mut output: File,
    ) -> io::Result<ProcessHandle> {
        writeln!(output, "{} started", server.name)?;
        let mut listeners = Vec::new();
        for port in &server.ports {
            if self.silent_ports.contains(port) {
                writeln!(output, "{} failed to bind port {port}", server.name)?;
                continue;
            }
            listeners.push(TcpListener::bind(("127.0.0.1", *port))?);
        }
        let pid = self.allocate_pid();
        self.running.insert(
            pid,
            Member {
                // Real members rewrite their process title; the reap pattern
                // stands in for it.
                command_line: format!("{command} [{}]", server.reap_pattern),
                _listeners: listeners,
            },
        );
        self.spawned.push(server.name.clone());
        Ok(ProcessHandle {
            server: server.name.clone(),
            pid,
        })
    }

    fn terminate(&mut self, pid: u32) -> io::Result<()> {
        self.terminated.push(pid);
        match self.running.remove(&pid) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such process")),
        }
    }

    fn own_pid(&self) -> u32 {
        self.own_pid
    }
}
