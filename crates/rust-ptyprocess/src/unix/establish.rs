//! Making a PTY the controlling terminal of a freshly forked child.
//!
//! The device name is resolved in the parent, before the fork, so that the
//! child side of [`ControllingTerminal`] performs no allocation between
//! `fork()` and `exec()`.

use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::Path;

use rustix::fs::{Mode, OFlags, open};
use rustix::io::Errno;
use rustix::process::setsid;

use crate::config::SessionSetup;
use crate::error::{PtyError, Result};

const DEV_TTY: &CStr = c"/dev/tty";

/// Why a PTY could not be made the controlling terminal.
///
/// Each step of the attach sequence fails with its own variant.
#[derive(Debug, thiserror::Error)]
pub enum EstablishError {
    /// Probing `/dev/tty` before detaching failed with something other than
    /// `ENXIO`.
    #[error("probing the inherited controlling terminal failed: {0}")]
    InheritedProbe(#[source] io::Error),

    /// `setsid()` failed.
    #[error("failed to start a new session: {0}")]
    NewSession(#[source] io::Error),

    /// `/dev/tty` could still be opened after `setsid()`.
    #[error("still attached to a controlling terminal after setsid()")]
    StillAttached,

    /// Probing `/dev/tty` after detaching failed with something other than
    /// `ENXIO`.
    #[error("probing /dev/tty after setsid() failed: {0}")]
    DetachProbe(#[source] io::Error),

    /// The PTY device could not be opened or attached.
    #[error("failed to open the terminal device: {0}")]
    OpenTerminal(#[source] io::Error),

    /// `/dev/tty` could not be opened after attaching the PTY.
    #[error("no controlling terminal after attaching the PTY: {0}")]
    NotAttached(#[source] io::Error),
}

impl EstablishError {
    /// Short name of the failed step.
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::InheritedProbe(_) => "inherited terminal probe",
            Self::NewSession(_) => "setsid",
            Self::StillAttached => "detach check",
            Self::DetachProbe(_) => "detach probe",
            Self::OpenTerminal(_) => "open terminal",
            Self::NotAttached(_) => "attach check",
        }
    }

    /// The errno behind the failure, if there is one.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::InheritedProbe(e)
            | Self::NewSession(e)
            | Self::DetachProbe(e)
            | Self::OpenTerminal(e)
            | Self::NotAttached(e) => e.raw_os_error(),
            Self::StillAttached => None,
        }
    }
}

/// A terminal device that a child process will adopt as its controlling
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllingTerminal {
    name: CString,
}

impl ControllingTerminal {
    /// Resolve the device name of the terminal open on `tty`.
    ///
    /// # Errors
    ///
    /// Returns an error if `tty` is not a terminal.
    pub fn resolve(tty: BorrowedFd<'_>) -> Result<Self> {
        let name = rustix::termios::ttyname(tty, Vec::with_capacity(64))
            .map_err(|e| PtyError::Create(io::Error::from(e)))?;
        Ok(Self { name })
    }

    /// Use a known device path.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::InvalidArgument`] if the path contains a NUL byte.
    pub fn from_path(path: &Path) -> Result<Self> {
        use std::os::unix::ffi::OsStrExt;

        let name = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| PtyError::InvalidArgument { what: "terminal path" })?;
        Ok(Self { name })
    }

    /// The device path.
    #[must_use]
    pub fn name(&self) -> &CStr {
        &self.name
    }

    /// Detach from any controlling terminal, start a new session and attach
    /// this device, probing `/dev/tty` around each step.
    ///
    /// Runs in the child between `fork()` and `exec()`; it does not allocate.
    ///
    /// # Errors
    ///
    /// Returns the [`EstablishError`] of the first step that failed.
    pub fn establish(&self) -> std::result::Result<(), EstablishError> {
        // ENXIO is the expected answer when nothing is attached, as under cron.
        match open(DEV_TTY, OFlags::RDWR | OFlags::NOCTTY, Mode::empty()) {
            Ok(fd) => drop(fd),
            Err(Errno::NXIO) => {}
            Err(e) => return Err(EstablishError::InheritedProbe(e.into())),
        }

        setsid().map_err(|e| EstablishError::NewSession(e.into()))?;

        match open(DEV_TTY, OFlags::RDWR | OFlags::NOCTTY, Mode::empty()) {
            Ok(fd) => {
                drop(fd);
                return Err(EstablishError::StillAttached);
            }
            Err(Errno::NXIO) => {}
            Err(e) => return Err(EstablishError::DetachProbe(e.into())),
        }

        let tty = open(self.name.as_c_str(), OFlags::RDWR, Mode::empty())
            .map_err(|e| EstablishError::OpenTerminal(e.into()))?;
        attach_explicitly(&tty).map_err(EstablishError::OpenTerminal)?;
        drop(tty);

        let tty = open(DEV_TTY, OFlags::WRONLY, Mode::empty())
            .map_err(|e| EstablishError::NotAttached(e.into()))?;
        drop(tty);

        Ok(())
    }

    /// Attach the terminal using the given strategy.
    ///
    /// `tty` is the child's already open descriptor for this device.
    ///
    /// # Errors
    ///
    /// Returns the [`EstablishError`] of the first step that failed.
    pub fn attach(
        &self,
        setup: SessionSetup,
        tty: BorrowedFd<'_>,
    ) -> std::result::Result<(), EstablishError> {
        match setup {
            SessionSetup::Probe => self.establish(),
            SessionSetup::Direct => {
                setsid().map_err(|e| EstablishError::NewSession(e.into()))?;
                set_controlling_terminal(tty).map_err(EstablishError::OpenTerminal)
            }
        }
    }
}

/// `TIOCSCTTY` on `tty`; the caller must be a session leader.
fn set_controlling_terminal(tty: impl std::os::fd::AsFd) -> io::Result<()> {
    // SAFETY: the descriptor is open for the duration of the call and
    // TIOCSCTTY takes an integer argument, not a pointer.
    let rc = unsafe { libc::ioctl(tty.as_fd().as_raw_fd(), libc::TIOCSCTTY as _, 0) };
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Opening the device already attached it on these platforms.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "aix"
))]
fn attach_explicitly(_tty: impl std::os::fd::AsFd) -> io::Result<()> {
    Ok(())
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "aix"
)))]
fn attach_explicitly(tty: impl std::os::fd::AsFd) -> io::Result<()> {
    set_controlling_terminal(tty)
}
