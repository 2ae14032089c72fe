//! Launches the fleet members selected by a lifecycle mode.
//!
//! A launch runs in a fixed order: host prerequisites are verified first so
//! a misconfigured machine fails before anything is touched, then stale build
//! artefacts are removed, the backend is rebuilt when gateways will run, and
//! finally each member is spawned detached with its output redirected.

use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use fleet_config::{FleetConfig, FleetPaths, LifecycleMode, LogTarget, ServerGroup};
use tracing::{debug, info, warn};

use super::error::{LifecycleError, Prerequisite};
use super::host::{CommandLine, ProcessHandle, ProcessHost};
use super::reaper::CleanupIssue;
use super::types::LifecycleOutput;
use super::utils::{
    open_capture, remove_dir_if_exists, remove_if_exists, replace_log_file, resolve_on_path,
};

/// Token in the proxy template replaced by the MIME-types table path.
const MIME_TYPES_TOKEN: &str = "mime.types";

/// Members spawned by one launch.
///
/// Dropping the value leaves the processes running; they are only stopped by
/// an explicit reap.
#[derive(Debug, Default)]
pub struct LaunchedFleet {
    pub handles: Vec<ProcessHandle>,
    pub issues: Vec<CleanupIssue>,
}

impl LaunchedFleet {
    /// Names of the spawned members in launch order.
    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(|handle| handle.server.as_str())
    }
}

/// Spawns fleet members through a [`ProcessHost`].
pub struct Launcher<'a, H: ProcessHost> {
    config: &'a FleetConfig,
    host: &'a mut H,
}

impl<'a, H: ProcessHost> Launcher<'a, H> {
    pub fn new(config: &'a FleetConfig, host: &'a mut H) -> Self {
        Self { config, host }
    }

    /// Prepares the host and spawns every member `mode` includes.
    ///
    /// # Errors
    ///
    /// Fails with [`LifecycleError::PrerequisiteMissing`] before any side
    /// effect, with [`LifecycleError::BuildFailed`] before any spawn, or with
    /// a launch error when a member cannot be started. Members spawned before
    /// a launch error keep running.
    pub fn launch<W: Write, E: Write>(
        &mut self,
        mode: LifecycleMode,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<LaunchedFleet, LifecycleError> {
        check_prerequisites(self.config, mode)?;
        let mut fleet = LaunchedFleet::default();
        remove_stale_artefacts(&self.config.paths, &mut fleet.issues);
        if mode.requires_build() {
            self.build(output)?;
        }

        output.begin_group("Start required servers")?;
        let spawned = self.spawn_members(mode, &mut fleet);
        output.end_group()?;
        spawned?;
        Ok(fleet)
    }

    fn build<W: Write, E: Write>(
        &mut self,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<(), LifecycleError> {
        let Some((program, arguments)) = self.config.build_command.split_first() else {
            return Ok(());
        };
        let command = CommandLine::new(program)
            .args(arguments)
            .current_dir(self.config.paths.root());
        let rendered = command.to_string();
        output.begin_group("Build backend")?;
        info!(command = %rendered, "building backend");
        let outcome = self.host.run(&command);
        output.end_group()?;
        let outcome = outcome.map_err(|source| LifecycleError::BuildSpawn {
            command: rendered.clone(),
            source,
        })?;
        debug!(stdout = %outcome.stdout.trim_end(), "backend build output");
        if outcome.success() {
            return Ok(());
        }
        output.stderr_line(format_args!("{}", outcome.stderr.trim_end()))?;
        Err(LifecycleError::BuildFailed {
            command: rendered,
            status: outcome.code,
            stderr: outcome.stderr.trim_end().to_owned(),
        })
    }

    fn spawn_members(
        &mut self,
        mode: LifecycleMode,
        fleet: &mut LaunchedFleet,
    ) -> Result<(), LifecycleError> {
        let paths = &self.config.paths;
        fs::create_dir_all(paths.log_dir()).map_err(|source| LifecycleError::PrepareLogs {
            path: paths.log_dir().to_path_buf(),
            source,
        })?;
        if mode.includes(ServerGroup::Permanent) {
            render_proxy_config(paths, &self.config.mime_types)?;
        }

        let capture_path = paths.capture_file();
        let capture = open_capture(&capture_path).map_err(|source| LifecycleError::OpenLog {
            path: capture_path.clone(),
            source,
        })?;
        for server in self.config.servers_for(mode) {
            let (log_path, log_file) = match &server.log {
                LogTarget::SharedCapture => (capture_path.clone(), capture.try_clone()),
                LogTarget::Dedicated(path) => (path.clone(), replace_log_file(path)),
            };
            let log_file = log_file.map_err(|source| LifecycleError::OpenLog {
                path: log_path,
                source,
            })?;
            let command = CommandLine::for_server(&server, paths.root());
            let handle = self
                .host
                .spawn(&server, &command, log_file)
                .map_err(|source| LifecycleError::Launch {
                    server: server.name.clone(),
                    source,
                })?;
            info!(server = %handle.server, pid = handle.pid, "launched fleet member");
            fleet.handles.push(handle);
        }

        // The proxy may outlive a restart-only launch, so the link is
        // refreshed whatever the mode.
        if let Err(issue) = link_proxy_error_log(paths) {
            debug!(issue = %issue, "proxy error log not linked");
            fleet.issues.push(issue);
        }
        Ok(())
    }
}

fn check_prerequisites(config: &FleetConfig, mode: LifecycleMode) -> Result<(), LifecycleError> {
    if mode.includes(ServerGroup::Permanent) {
        require_binary(&config.proxy_binary)?;
        if !config.proxy_lib_dir.is_dir() {
            return Err(LifecycleError::PrerequisiteMissing(Prerequisite::Directory(
                config.proxy_lib_dir.clone(),
            )));
        }
    }
    if mode.requires_build() {
        if let Some(program) = config.build_command.first() {
            require_binary(program)?;
        }
    }
    Ok(())
}

fn require_binary(program: &str) -> Result<(), LifecycleError> {
    match resolve_on_path(program) {
        Some(path) => {
            debug!(program, path = %path.display(), "resolved prerequisite");
            Ok(())
        }
        None => Err(LifecycleError::PrerequisiteMissing(Prerequisite::Binary(
            program.to_owned(),
        ))),
    }
}

/// Removes the previous distribution build and packaged archives.
///
/// Failures are recorded and the launch carries on; a stale build is
/// overwritten by the next one anyway.
fn remove_stale_artefacts(paths: &FleetPaths, issues: &mut Vec<CleanupIssue>) {
    let dist = paths.dist_dir();
    if let Err(source) = remove_dir_if_exists(&dist) {
        warn!(path = %dist, error = %source, "failed to remove previous build");
        issues.push(CleanupIssue::Remove { path: dist, source });
    }
    let entries = match fs::read_dir(paths.root()) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(root = %paths.root(), error = %error, "failed to scan project root");
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !FleetPaths::is_stale_package(name) {
            continue;
        }
        let path = paths.root().join(name);
        if let Err(source) = remove_if_exists(&path) {
            warn!(path = %path, error = %source, "failed to remove stale package");
            issues.push(CleanupIssue::Remove { path, source });
        }
    }
}

/// Renders the proxy template into the project root.
///
/// The template is written to a temporary file next to its destination and
/// persisted over it, so a concurrently starting proxy never reads a
/// half-written configuration.
fn render_proxy_config(
    paths: &FleetPaths,
    mime_types: &Utf8Path,
) -> Result<Utf8PathBuf, LifecycleError> {
    let template_path = paths.proxy_template();
    let template =
        fs::read_to_string(&template_path).map_err(|source| LifecycleError::RenderProxyConfig {
            path: template_path.clone(),
            source,
        })?;
    let rendered = template.replace(MIME_TYPES_TOKEN, mime_types.as_str());

    let target = paths.rendered_proxy_config();
    let render_error = |source: io::Error| LifecycleError::RenderProxyConfig {
        path: target.clone(),
        source,
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".nginx")
        .suffix(".conf")
        .tempfile_in(paths.root())
        .map_err(render_error)?;
    staged
        .write_all(rendered.as_bytes())
        .map_err(render_error)?;
    staged
        .persist(&target)
        .map_err(|error| render_error(error.error))?;
    debug!(path = %target, "rendered proxy configuration");
    Ok(target)
}

#[cfg(unix)]
fn link_proxy_error_log(paths: &FleetPaths) -> Result<(), CleanupIssue> {
    let target = paths.proxy_error_log();
    if !target.exists() {
        return Err(CleanupIssue::FileNotFound { path: target });
    }
    let link = paths.proxy_error_log_link();
    let link_error = |source: io::Error| CleanupIssue::Link {
        link: link.clone(),
        target: target.clone(),
        source,
    };
    remove_if_exists(&link).map_err(link_error)?;
    std::os::unix::fs::symlink(&target, &link).map_err(link_error)
}

#[cfg(not(unix))]
fn link_proxy_error_log(paths: &FleetPaths) -> Result<(), CleanupIssue> {
    Err(CleanupIssue::FileNotFound {
        path: paths.proxy_error_log(),
    })
}

