//! Locating executables on the search path.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use rustix::fs::{Access, access};

/// Search path used when `PATH` is not set.
pub const DEFAULT_PATH: &str = "/bin:/usr/bin";

/// Turns a command name into the path of an executable.
pub trait ExecutableResolver {
    /// Resolve `name`, or `None` if no executable matches.
    fn resolve(&self, name: &OsStr) -> Option<PathBuf>;
}

/// Resolver that walks a colon-separated search path, like `which(1)`.
///
/// Names containing a `/` are checked as given. An empty path entry means
/// the current directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    path: OsString,
}

impl SearchPath {
    /// Use an explicit search path.
    #[must_use]
    pub fn new(path: impl Into<OsString>) -> Self {
        Self { path: path.into() }
    }

    /// Use `PATH` from this process's environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("PATH").unwrap_or_else(|| DEFAULT_PATH.into()))
    }

    /// The directories searched, in order.
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.path.as_bytes().split(|&b| b == b':').map(|dir| {
            if dir.is_empty() {
                Path::new(".")
            } else {
                Path::new(OsStr::from_bytes(dir))
            }
        })
    }
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ExecutableResolver for SearchPath {
    fn resolve(&self, name: &OsStr) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        if name.as_bytes().contains(&b'/') {
            let candidate = PathBuf::from(name);
            return is_executable(&candidate).then_some(candidate);
        }

        self.dirs()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

/// A regular file the current user may execute.
fn is_executable(path: &Path) -> bool {
    path.metadata().is_ok_and(|m| m.is_file()) && access(path, Access::EXEC_OK).is_ok()
}
