//! Error types for fleet lifecycle operations.

use std::fmt;
use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Host requirement checked before any side effect of a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// Executable that must resolve on `PATH`.
    Binary(String),
    /// Directory that must exist.
    Directory(Utf8PathBuf),
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(binary) => write!(formatter, "`{binary}` must be installed and on PATH"),
            Self::Directory(path) => write!(formatter, "{path} directory not found"),
        }
    }
}

/// Errors raised while executing lifecycle commands.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(Prerequisite),
    #[error("backend build `{command}` failed (exit status: {status:?}): {stderr}")]
    BuildFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("failed to run backend build `{command}`: {source}")]
    BuildSpawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{}", .report.trim_end())]
    PortTimeout { ports: Vec<u16>, report: String },
    #[error("failed to prepare log directory {path}: {source}")]
    PrepareLogs {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open log file {path}: {source}")]
    OpenLog {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to render proxy configuration {path}: {source}")]
    RenderProxyConfig {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch {server}: {source}")]
    Launch {
        server: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write lifecycle output: {0}")]
    Io(#[source] io::Error),
}
