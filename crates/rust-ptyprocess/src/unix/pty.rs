//! Unix PTY pair allocation.
//!
//! Both sides are opened with `O_NOCTTY` so that allocating a pair never
//! changes this process's own controlling terminal.

use std::ffi::OsString;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use rustix::fs::{Mode, OFlags, open};
use rustix::io::{FdFlags, fcntl_setfd};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};

use crate::error::{PtyError, Result};

/// A freshly allocated pseudo-terminal.
#[derive(Debug)]
pub struct PtyPair {
    /// The controlling side, kept by the parent.
    pub controller: OwnedFd,
    /// The subordinate side, handed to the child.
    pub subordinate: OwnedFd,
    /// Device path of the subordinate side.
    pub subordinate_path: PathBuf,
}

impl PtyPair {
    /// Allocate a new pseudo-terminal pair.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Create`] if any allocation step fails.
    pub fn open() -> Result<Self> {
        let controller = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).map_err(create)?;

        grantpt(&controller).map_err(create)?;
        unlockpt(&controller).map_err(create)?;

        // Spawns on other threads must not inherit the controlling side.
        fcntl_setfd(&controller, FdFlags::CLOEXEC).map_err(create)?;

        let name = ptsname(&controller, Vec::new()).map_err(create)?;
        let subordinate_path = PathBuf::from(OsString::from_vec(name.into_bytes()));

        let subordinate = open(
            &subordinate_path,
            OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(create)?;

        Ok(Self {
            controller,
            subordinate,
            subordinate_path,
        })
    }
}

fn create(errno: rustix::io::Errno) -> PtyError {
    PtyError::Create(io::Error::from_raw_os_error(errno.raw_os_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_pty() {
        let pair = PtyPair::open().unwrap();
        let path = pair.subordinate_path.to_string_lossy();
        assert!(path.starts_with("/dev/pts/") || path.starts_with("/dev/tty"));
        assert!(rustix::termios::isatty(&pair.subordinate));
        assert!(rustix::termios::isatty(&pair.controller));
    }

    #[test]
    fn data_flows_between_sides() {
        let pair = PtyPair::open().unwrap();
        crate::unix::termios::set_echo(&pair.subordinate, false).unwrap();

        rustix::io::write(&pair.subordinate, b"ping\n").unwrap();
        let mut buf = [0u8; 64];
        let n = rustix::io::read(&pair.controller, &mut buf).unwrap();
        assert!(buf[..n].starts_with(b"ping"));
    }
}
