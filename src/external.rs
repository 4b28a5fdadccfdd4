//! Locating external programs and interpreting their exit status.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Resolve a program path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returned if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returned if it exists.
/// - `./foo` on Unix or any `./`-prefixed path on other platforms: returned if it exists.
/// - Single path component (no separators): search each directory in
///   `search_paths` (PATH) and return the first existing match.
/// - Empty path: `None`.
pub fn find_command_path(search_paths: &OsStr, program: &Path) -> Option<PathBuf> {
    if program.is_absolute() {
        return existing(program);
    }

    let search_in_current_dir = cfg!(not(unix)) || program.starts_with("./");
    if search_in_current_dir && program.exists() {
        return Some(program.to_path_buf());
    }

    let mut components = program.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(name), None) => find_in_path(search_paths, name.as_os_str()),
        // Multiple components resolve relative to the current directory.
        _ => existing(program),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths).find_map(|dir| existing(&dir.join(cmd)))
}

fn existing(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

/// Exit code for a child that did not exit normally.
///
/// Signal terminations map to the shell convention `128 + signal`;
/// a core dump without a recorded signal maps to 255.
#[cfg(unix)]
pub fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
pub fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
