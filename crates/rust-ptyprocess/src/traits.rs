//! Core traits and shared types.
//!
//! - [`PtyStream`]: the read/write contract shared by the byte-level
//!   [`PtyProcess`](crate::PtyProcess) and the text-level
//!   [`PtyProcessUnicode`](crate::PtyProcessUnicode) decorator.
//! - [`ExitStatus`]: how a child process ended.

use crate::error::Result;

/// Reading and writing a terminal stream.
///
/// End of stream is reported as [`PtyError::Eof`](crate::PtyError::Eof), never
/// as an empty chunk.
pub trait PtyStream {
    /// What a read produces (`Vec<u8>` or `String`).
    type Output;
    /// What a write accepts (`[u8]` or `str`).
    type Input: ?Sized;

    /// Read at most `size` bytes with a single underlying read.
    fn read(&mut self, size: usize) -> Result<Self::Output>;

    /// Read up to and including the next newline.
    fn read_line(&mut self) -> Result<Self::Output>;

    /// Write data to the terminal, returning the number of bytes written.
    fn write(&mut self, data: &Self::Input) -> Result<usize>;
}

impl<T: PtyStream + ?Sized> PtyStream for &mut T {
    type Output = T::Output;
    type Input = T::Input;

    fn read(&mut self, size: usize) -> Result<Self::Output> {
        (**self).read(size)
    }

    fn read_line(&mut self) -> Result<Self::Output> {
        (**self).read_line()
    }

    fn write(&mut self, data: &Self::Input) -> Result<usize> {
        (**self).write(data)
    }
}

/// Exit status of a child process.
///
/// Exactly one of exit code and signal number is present, by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited normally with the given exit code.
    Exited(i32),

    /// The process was terminated by a signal.
    Signaled(i32),
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code, if the process exited normally.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    /// Get the signal number that terminated the process.
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(*sig),
            Self::Exited(_) => None,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}
