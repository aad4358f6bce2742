//! Liveness checks and reaping of the child process.
//!
//! A [`Reaper`] moves from [`ProcessState::Running`] to
//! [`ProcessState::Terminated`] exactly once, the first time a `waitpid`
//! call reports that the child exited or was killed.

use std::io;

use rustix::io::Errno;
use rustix::process::{Pid, WaitOptions, WaitStatus, waitpid};

use crate::error::{PtyError, Result};
use crate::traits::ExitStatus;

/// Lifecycle state of the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Not yet reaped.
    Running,
    /// Reaped; the outcome never changes again.
    Terminated(ExitStatus),
}

/// Non-blocking and blocking reap protocol for one child pid.
#[derive(Debug)]
pub struct Reaper {
    pid: Pid,
    state: ProcessState,
}

impl Reaper {
    /// Track the child with the given pid.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Internal`] if `pid` is not a valid child pid.
    pub fn new(pid: i32) -> Result<Self> {
        let pid = Pid::from_raw(pid).ok_or(PtyError::Internal("invalid child pid"))?;
        Ok(Self {
            pid,
            state: ProcessState::Running,
        })
    }

    /// The tracked pid.
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// The exit status, once terminated.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        match self.state {
            ProcessState::Terminated(status) => Some(status),
            ProcessState::Running => None,
        }
    }

    /// Check whether the child is still running.
    ///
    /// With `block` set the status query may wait for the child; otherwise
    /// it returns immediately. A "no status yet" answer is asked once more
    /// before the child is reported alive.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Internal`] if there is no such child (something
    /// else reaped it) and [`PtyError::Stopped`] if the child was stopped.
    pub fn is_alive(&mut self, block: bool) -> Result<bool> {
        if let ProcessState::Terminated(_) = self.state {
            return Ok(false);
        }

        let options = if block {
            WaitOptions::empty()
        } else {
            WaitOptions::NOHANG
        };

        let status = match self.query(options)? {
            Some(status) => status,
            // Some platforms need a second look before a status shows up.
            None => match self.query(options)? {
                Some(status) => status,
                None => return Ok(true),
            },
        };

        self.record(status)?;
        Ok(false)
    }

    /// Block until the child exits.
    ///
    /// A child that is already known to be terminated returns its recorded
    /// status without another system call.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Internal`] if there is no such child and
    /// [`PtyError::Stopped`] if the child was stopped.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        if let ProcessState::Terminated(status) = self.state {
            return Ok(status);
        }

        match self.query(WaitOptions::empty())? {
            Some(status) => self.record(status),
            None => Err(PtyError::Wait(io::Error::new(
                io::ErrorKind::WouldBlock,
                "blocking wait returned no status",
            ))),
        }
    }

    fn query(&self, options: WaitOptions) -> Result<Option<WaitStatus>> {
        loop {
            match waitpid(Some(self.pid), options) {
                Ok(Some((_pid, status))) => return Ok(Some(status)),
                Ok(None) => return Ok(None),
                Err(Errno::INTR) => {}
                Err(Errno::CHILD) => {
                    return Err(PtyError::Internal(
                        "no child process to wait for; did something else reap it?",
                    ));
                }
                Err(e) => return Err(PtyError::Wait(e.into())),
            }
        }
    }

    fn record(&mut self, status: WaitStatus) -> Result<ExitStatus> {
        let status = classify(status.as_raw() as i32)?;
        tracing::debug!(pid = self.pid.as_raw_nonzero().get(), %status, "child reaped");
        self.state = ProcessState::Terminated(status);
        Ok(status)
    }
}

/// Turn a raw `waitpid` status into an exit code or a signal number.
///
/// # Errors
///
/// Returns [`PtyError::Stopped`] for a job-control stop, which this crate
/// does not support.
pub fn classify(status: i32) -> Result<ExitStatus> {
    if libc::WIFEXITED(status) {
        Ok(ExitStatus::Exited(libc::WEXITSTATUS(status)))
    } else if libc::WIFSIGNALED(status) {
        Ok(ExitStatus::Signaled(libc::WTERMSIG(status)))
    } else if libc::WIFSTOPPED(status) {
        Err(PtyError::Stopped {
            signal: libc::WSTOPSIG(status),
        })
    } else {
        Err(PtyError::Internal("unrecognized wait status"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_exit() {
        // exit(3): status byte in bits 8..16, low bits zero.
        assert_eq!(classify(3 << 8).unwrap(), ExitStatus::Exited(3));
        assert_eq!(classify(0).unwrap(), ExitStatus::Exited(0));
    }

    #[test]
    fn classify_signal() {
        assert_eq!(
            classify(libc::SIGKILL).unwrap(),
            ExitStatus::Signaled(libc::SIGKILL)
        );
    }

    #[test]
    fn classify_stopped() {
        // WIFSTOPPED: low byte 0x7f, stop signal in bits 8..16.
        let err = classify((libc::SIGTSTP << 8) | 0x7f).unwrap_err();
        assert!(matches!(err, PtyError::Stopped { signal } if signal == libc::SIGTSTP));
    }

    #[test]
    fn rejects_invalid_pid() {
        assert!(matches!(Reaper::new(0), Err(PtyError::Internal(_))));
    }

    #[test]
    fn reap_real_child() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        let mut reaper = Reaper::new(child.id() as i32).unwrap();

        assert_eq!(reaper.wait().unwrap(), ExitStatus::Exited(7));
        assert_eq!(reaper.state(), ProcessState::Terminated(ExitStatus::Exited(7)));
        assert!(!reaper.is_alive(false).unwrap());
        assert_eq!(reaper.wait().unwrap(), ExitStatus::Exited(7));
    }

    #[test]
    fn alive_until_killed() {
        let child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let mut reaper = Reaper::new(child.id() as i32).unwrap();

        assert!(reaper.is_alive(false).unwrap());
        assert_eq!(reaper.exit_status(), None);

        let kill = rustix::process::Signal::from_named_raw(libc::SIGKILL).unwrap();
        rustix::process::kill_process(reaper.pid(), kill).unwrap();
        assert_eq!(
            reaper.wait().unwrap(),
            ExitStatus::Signaled(libc::SIGKILL)
        );
        assert!(!reaper.is_alive(false).unwrap());
    }

    #[test]
    fn foreign_reap_is_internal_error() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let mut reaper = Reaper::new(child.id() as i32).unwrap();
        child.wait().unwrap();

        assert!(matches!(reaper.is_alive(false), Err(PtyError::Internal(_))));
    }
}
