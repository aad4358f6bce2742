//! Error types for the rust-ptyprocess crate.
//!
//! [`PtyError`] separates the outcomes a caller has to tell apart: end of
//! stream ([`PtyError::Eof`]), operations the terminal does not support
//! ([`PtyError::Unsupported`]), broken internal invariants
//! ([`PtyError::Internal`]) and plain I/O failures.

use std::io;

pub use crate::unix::EstablishError;

/// The error type for PTY process operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// End of the terminal stream. Latched by the handle once observed.
    #[error("end of file reached on the terminal")]
    Eof,

    /// A time-bounded operation did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred during PTY operations.
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    /// The descriptor does not support the requested terminal operation.
    #[error("{operation} is not supported on this terminal: {source}")]
    Unsupported {
        /// The terminal operation that was attempted.
        operation: &'static str,
        /// The underlying error (`ENOTTY` or `EINVAL`).
        #[source]
        source: io::Error,
    },

    /// An invariant the process bookkeeping relies on was violated.
    #[error("internal consistency failure: {0}")]
    Internal(&'static str),

    /// The PTY could not be made the child's controlling terminal.
    #[error(transparent)]
    Establish(#[from] EstablishError),

    /// The command could not be found on the search path.
    #[error("command not found or not executable: {command}")]
    CommandNotFound {
        /// The command as given by the caller.
        command: String,
    },

    /// An argument could not be passed to the child process.
    #[error("invalid {what}: contains an interior NUL byte or is empty")]
    InvalidArgument {
        /// Which argument was rejected.
        what: &'static str,
    },

    /// Failed to create a new PTY.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// Failed to fork the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// Failed to wait for the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),

    /// Failed to send a signal to the child process.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// The child was stopped by job control, which is not supported.
    #[error("child process was stopped by signal {signal}; is another process doing job control with it?")]
    Stopped {
        /// The signal that stopped the child.
        signal: i32,
    },

    /// The handle has been closed.
    #[error("PTY has been closed")]
    Closed,

    /// The child survived the whole termination sequence.
    #[error("could not terminate the child process")]
    TerminateFailed,

    /// Terminal output was not valid UTF-8.
    #[error("invalid UTF-8 in terminal output: {0}")]
    Decode(#[source] std::str::Utf8Error),

    /// Terminal output ended in the middle of a UTF-8 sequence.
    #[error("terminal output ended inside a {0}-byte incomplete UTF-8 sequence")]
    IncompleteInput(usize),
}

impl PtyError {
    /// Whether this is the end-of-stream condition.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// Whether this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether the terminal rejected the operation as unsupported.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Whether this is an `EAGAIN`/`EWOULDBLOCK` I/O error.
    pub(crate) fn is_would_block(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }
}

/// A specialized Result type for PTY process operations.
pub type Result<T> = std::result::Result<T, PtyError>;

impl From<rustix::io::Errno> for PtyError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(io::Error::from_raw_os_error(errno.raw_os_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(PtyError::Closed.to_string(), "PTY has been closed");
        assert_eq!(
            PtyError::Eof.to_string(),
            "end of file reached on the terminal"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let pty_err: PtyError = io_err.into();
        assert!(matches!(pty_err, PtyError::Io(_)));
        assert!(!pty_err.is_eof());
    }

    #[test]
    fn predicates() {
        assert!(PtyError::Eof.is_eof());
        assert!(PtyError::Timeout.is_timeout());
        let unsupported = PtyError::Unsupported {
            operation: "set_echo",
            source: io::Error::from_raw_os_error(libc::ENOTTY),
        };
        assert!(unsupported.is_unsupported());
        assert!(unsupported.to_string().starts_with("set_echo is not supported"));
    }

    #[test]
    fn would_block_detection() {
        let err = PtyError::Io(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(err.is_would_block());
        assert!(!PtyError::Closed.is_would_block());
    }

    #[test]
    fn errno_conversion_keeps_code() {
        let err: PtyError = rustix::io::Errno::IO.into();
        match err {
            PtyError::Io(e) => assert_eq!(e.raw_os_error(), Some(libc::EIO)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
