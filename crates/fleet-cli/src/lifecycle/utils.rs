//! Filesystem and environment helpers shared by the launcher and the reaper.

use std::env;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;

use camino::Utf8Path;

/// Locates `program` the way a shell would: paths containing a separator are
/// checked directly, bare names are searched on `PATH`.
pub(super) fn resolve_on_path(program: &str) -> Option<PathBuf> {
    let candidate = PathBuf::from(program);
    if candidate.components().count() > 1 {
        return is_executable(&candidate).then_some(candidate);
    }
    let search_path = env::var_os("PATH")?;
    env::split_paths(&search_path)
        .map(|dir| dir.join(OsStr::new(program)))
        .find(|path| is_executable(path))
}

fn is_executable(path: &std::path::Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Removes a file or symlink. Returns `Ok(false)` when nothing was there.
pub(super) fn remove_if_exists(path: &Utf8Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Removes a directory tree. Returns `Ok(false)` when nothing was there.
pub(super) fn remove_dir_if_exists(path: &Utf8Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Opens the shared capture file for appending, creating it when absent.
pub(super) fn open_capture(path: &Utf8Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Replaces whatever sits at `path` with an empty log file.
pub(super) fn replace_log_file(path: &Utf8Path) -> io::Result<File> {
    remove_if_exists(path)?;
    File::create(path)
}

/// Effective user id used to restrict process scans to our own processes.
#[cfg(unix)]
pub(super) fn current_uid() -> Option<u32> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    Some(unsafe { libc::geteuid() })
}

#[cfg(not(unix))]
pub(super) fn current_uid() -> Option<u32> {
    None
}
