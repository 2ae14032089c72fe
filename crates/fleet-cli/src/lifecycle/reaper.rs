//! Terminates fleet members and removes the artefacts they leave behind.
//!
//! Reaping is best effort throughout: a member that is not running, a file
//! that was never written, or a signal that arrives after the process already
//! exited are all normal when tearing down a fixture. Such conditions are
//! collected as [`CleanupIssue`]s and logged; none of them fails the reap.

use std::collections::BTreeSet;
use std::io::{self, Write};

use camino::Utf8PathBuf;
use fleet_config::{FleetConfig, LifecycleMode, ServerGroup};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::error::LifecycleError;
use super::host::{CommandLine, ProcessHandle, ProcessHost};
use super::types::LifecycleOutput;
use super::utils::{current_uid, remove_if_exists};

/// Exit status `pgrep` uses when nothing matched.
const PGREP_NO_MATCH: i32 = 1;

/// Non-fatal condition met while reaping or linking logs.
#[derive(Debug, Error)]
pub enum CleanupIssue {
    #[error("no running process matches '{pattern}'")]
    ProcessNotFound { pattern: String },
    #[error("failed to list processes matching '{pattern}': {source}")]
    ProcessScan {
        pattern: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to signal pid {pid} ({target}): {source}")]
    Signal {
        target: String,
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("{path} does not exist")]
    FileNotFound { path: Utf8PathBuf },
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to link {link} to {target}: {source}")]
    Link {
        link: Utf8PathBuf,
        target: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of a reap.
#[derive(Debug, Default)]
pub struct ReapReport {
    /// Pids that accepted SIGTERM.
    pub terminated: Vec<u32>,
    /// Files that were removed.
    pub removed: Vec<Utf8PathBuf>,
    pub issues: Vec<CleanupIssue>,
}

/// Stops fleet members, either by command-line pattern or by handle.
pub struct Reaper<'a, H: ProcessHost> {
    config: &'a FleetConfig,
    host: &'a mut H,
}

impl<'a, H: ProcessHost> Reaper<'a, H> {
    pub fn new(config: &'a FleetConfig, host: &'a mut H) -> Self {
        Self { config, host }
    }

    /// Terminates every process of the current user whose command line
    /// matches a member of `mode`, then removes that mode's transient files.
    ///
    /// Matching by pattern finds members left over from earlier runs or
    /// crashed orchestrators, not only the ones this process spawned.
    ///
    /// # Errors
    ///
    /// Only fails when the progress output cannot be written.
    pub fn reap<W: Write, E: Write>(
        &mut self,
        mode: LifecycleMode,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ReapReport, LifecycleError> {
        output.begin_group("E2E cleanup")?;
        let mut report = ReapReport::default();
        let reaped = self.reap_inner(mode, &mut report, output);
        output.end_group()?;
        reaped?;
        info!(
            mode = %mode,
            terminated = report.terminated.len(),
            issues = report.issues.len(),
            "fleet reaped"
        );
        Ok(report)
    }

    /// Terminates members spawned by this process, newest first.
    pub fn reap_handles(&mut self, handles: &[ProcessHandle]) -> ReapReport {
        let mut report = ReapReport::default();
        for handle in handles.iter().rev() {
            match self.host.terminate(handle.pid) {
                Ok(()) => {
                    debug!(server = %handle.server, pid = handle.pid, "terminated fleet member");
                    report.terminated.push(handle.pid);
                }
                Err(source) => report.issues.push(CleanupIssue::Signal {
                    target: handle.server.clone(),
                    pid: handle.pid,
                    source,
                }),
            }
        }
        report
    }

    fn reap_inner<W: Write, E: Write>(
        &mut self,
        mode: LifecycleMode,
        report: &mut ReapReport,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<(), LifecycleError> {
        for pattern in self.patterns_for(mode) {
            let before = report.terminated.len();
            self.kill_matching(pattern, report);
            if report.terminated.len() > before {
                output.stdout_line(format_args!("Killed {pattern}"))?;
            }
        }

        let paths = &self.config.paths;
        let mut files = Vec::new();
        if mode.includes(ServerGroup::Permanent) {
            files.extend([
                paths.rendered_proxy_config(),
                paths.proxy_pid_file(),
                paths.proxy_error_log(),
            ]);
        }
        files.push(paths.leftover_output());
        for path in files {
            match remove_if_exists(&path) {
                Ok(true) => report.removed.push(path),
                Ok(false) => report.issues.push(CleanupIssue::FileNotFound { path }),
                Err(source) => {
                    warn!(path = %path, error = %source, "failed to remove fixture artefact");
                    report.issues.push(CleanupIssue::Remove { path, source });
                }
            }
        }
        for issue in &report.issues {
            debug!(issue = %issue, "cleanup issue");
        }
        Ok(())
    }

    /// Reap patterns of `mode` in reverse launch order, without duplicates.
    fn patterns_for(&self, mode: LifecycleMode) -> Vec<&'static str> {
        let mut seen = BTreeSet::new();
        self.config
            .servers_for(mode)
            .iter()
            .rev()
            .map(|server| server.reap_pattern)
            .filter(|pattern| seen.insert(*pattern))
            .collect()
    }

    fn kill_matching(&mut self, pattern: &str, report: &mut ReapReport) {
        let pids = match self.find_matching(pattern) {
            Ok(pids) => pids,
            Err(source) => {
                warn!(pattern, error = %source, "process scan failed");
                report.issues.push(CleanupIssue::ProcessScan {
                    pattern: pattern.to_owned(),
                    source,
                });
                return;
            }
        };
        if pids.is_empty() {
            report.issues.push(CleanupIssue::ProcessNotFound {
                pattern: pattern.to_owned(),
            });
            return;
        }
        for pid in pids {
            match self.host.terminate(pid) {
                Ok(()) => report.terminated.push(pid),
                Err(source) => report.issues.push(CleanupIssue::Signal {
                    target: pattern.to_owned(),
                    pid,
                    source,
                }),
            }
        }
    }

    fn find_matching(&mut self, pattern: &str) -> io::Result<Vec<u32>> {
        let mut command = CommandLine::new("pgrep");
        if let Some(uid) = current_uid() {
            command = command.arg("-U").arg(uid.to_string());
        }
        let command = command.arg("-f").arg(pattern);
        let outcome = self.host.run(&command)?;
        if outcome.code == Some(PGREP_NO_MATCH) {
            return Ok(Vec::new());
        }
        if !outcome.success() {
            return Err(io::Error::other(format!(
                "`{command}` exited with {:?}: {}",
                outcome.code,
                outcome.stderr.trim_end()
            )));
        }
        let own_pid = self.host.own_pid();
        Ok(outcome
            .stdout
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .filter(|pid| *pid != own_pid)
            .collect())
    }
}
