//! The handle to a child process running in a PTY.

use std::ffi::OsString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustix::io::Errno;
use rustix::process::{Signal, kill_process};

use crate::config::{Delays, PtyConfig, PtySignal, WindowSize};
use crate::error::{PtyError, Result};
use crate::traits::{ExitStatus, PtyStream};
use crate::unix::control::{ControlChars, control_code};
use crate::unix::reap::{ProcessState, Reaper};
use crate::unix::termios;

/// Chunk size used while looking for a newline.
const LINE_CHUNK: usize = 1024;

/// How often [`PtyProcess::wait_no_echo`] looks at the echo flag.
pub(crate) const ECHO_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A child process attached to a pseudo-terminal.
///
/// The handle owns the controlling side of the terminal. Reading returns
/// whatever the child wrote to its stdout or stderr; writing feeds its stdin
/// through the line discipline.
///
/// Dropping the handle closes the terminal and, if the child is still
/// running, forcibly terminates it. Call [`close`](Self::close) to observe
/// errors instead.
///
/// # Example
///
/// ```no_run
/// use rust_ptyprocess::{PtyConfig, PtyProcess};
///
/// # fn main() -> rust_ptyprocess::Result<()> {
/// let mut child = PtyProcess::spawn(["sh", "-c", "echo hello"], &PtyConfig::default())?;
/// let line = child.read_line()?;
/// assert!(line.starts_with(b"hello"));
/// assert_eq!(child.wait()?.code(), Some(0));
/// # Ok(())
/// # }
/// ```
pub struct PtyProcess {
    pid: i32,
    fd: Option<OwnedFd>,
    reaper: Reaper,
    eof_reached: bool,
    echo: Option<bool>,
    pending: Vec<u8>,
    control_chars: ControlChars,
    pub(crate) delays: Delays,
    blocking_reap_after_eof: bool,
    argv: Vec<OsString>,
    env: Option<Vec<(OsString, OsString)>>,
    working_dir: Option<PathBuf>,
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess")
            .field("pid", &self.pid)
            .field("fd", &self.fd.as_ref().map(AsRawFd::as_raw_fd))
            .field("state", &self.reaper.state())
            .field("eof", &self.eof_reached)
            .field("echo", &self.echo)
            .field("argv", &self.argv)
            .field("env", &self.env)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl PtyProcess {
    pub(crate) fn new(
        pid: i32,
        fd: OwnedFd,
        argv: Vec<OsString>,
        env: Option<Vec<(OsString, OsString)>>,
        config: &PtyConfig,
    ) -> Result<Self> {
        Ok(Self {
            pid,
            fd: Some(fd),
            reaper: Reaper::new(pid)?,
            eof_reached: false,
            echo: None,
            pending: Vec::new(),
            control_chars: config
                .control_chars
                .unwrap_or_else(ControlChars::inherited),
            delays: config.delays,
            blocking_reap_after_eof: config.blocking_reap_after_eof,
            argv,
            env,
            working_dir: config.working_directory.clone(),
        })
    }

    /// The child's process id.
    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid
    }

    /// The controlling side of the terminal.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Closed`] after [`close`](Self::close).
    pub fn as_fd(&self) -> Result<BorrowedFd<'_>> {
        use std::os::fd::AsFd;

        self.fd.as_ref().map(AsFd::as_fd).ok_or(PtyError::Closed)
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.fd.is_none()
    }

    /// Whether the handle's descriptor is a terminal. False once closed.
    #[must_use]
    pub fn isatty(&self) -> bool {
        self.fd.as_ref().is_some_and(rustix::termios::isatty)
    }

    /// Whether end of file has been read from the terminal.
    #[must_use]
    pub const fn eof(&self) -> bool {
        self.eof_reached
    }

    /// The command line the child was started with, `argv[0]` resolved.
    #[must_use]
    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    /// The environment given to the child, if the caller customised it.
    #[must_use]
    pub fn env(&self) -> Option<&[(OsString, OsString)]> {
        self.env.as_deref()
    }

    /// The child's working directory, if one was configured.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    // Reading

    /// Read at most `size` bytes with a single read from the terminal.
    ///
    /// Bytes left over by [`read_line`](Self::read_line) are returned first.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Eof`] once the child side is gone. Linux reports
    /// that as `EIO`, other systems as an empty read; both latch the handle
    /// so every later read returns `Eof` without touching the descriptor.
    pub fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        if self.fd.is_none() {
            return Err(PtyError::Closed);
        }
        if size == 0 {
            return Ok(Vec::new());
        }
        if let Some(chunk) = self.take_pending_upto(size) {
            return Ok(chunk);
        }
        if self.eof_reached {
            return Err(PtyError::Eof);
        }
        self.read_chunk(size)
    }

    /// Read up to and including the next newline.
    ///
    /// A final line without a newline is returned when the stream ends
    /// after it.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Eof`] when the stream has ended and nothing is
    /// buffered.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        if self.fd.is_none() {
            return Err(PtyError::Closed);
        }
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                return Ok(self.pending.drain(..=pos).collect());
            }
            if self.eof_reached {
                return self.take_pending();
            }
            match self.read_chunk(LINE_CHUNK) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(PtyError::Eof) => return self.take_pending(),
                Err(e) => return Err(e),
            }
        }
    }

    fn take_pending(&mut self) -> Result<Vec<u8>> {
        if self.pending.is_empty() {
            Err(PtyError::Eof)
        } else {
            Ok(std::mem::take(&mut self.pending))
        }
    }

    pub(crate) fn read_chunk(&mut self, size: usize) -> Result<Vec<u8>> {
        let fd = self.fd.as_ref().ok_or(PtyError::Closed)?;
        let mut buf = vec![0u8; size];

        let n = loop {
            match rustix::io::read(fd, buf.as_mut_slice()) {
                Ok(n) => break n,
                Err(Errno::INTR) => {}
                // Linux: the subordinate side has no open descriptors left.
                Err(Errno::IO) => break 0,
                Err(e) => return Err(e.into()),
            }
        };

        if n == 0 {
            tracing::trace!(pid = self.pid, "end of file on terminal");
            self.eof_reached = true;
            return Err(PtyError::Eof);
        }

        buf.truncate(n);
        Ok(buf)
    }

    pub(crate) fn push_pending(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    pub(crate) fn take_pending_upto(&mut self, size: usize) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        let n = size.min(self.pending.len());
        Some(self.pending.drain(..n).collect())
    }

    // Writing

    /// Write all of `data` to the terminal, returning its length.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Closed`] after [`close`](Self::close) and
    /// [`PtyError::Io`] if the write fails.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let fd = self.fd.as_ref().ok_or(PtyError::Closed)?;

        let mut written = 0;
        while written < data.len() {
            match rustix::io::write(fd, &data[written..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => written += n,
                Err(Errno::INTR) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(written)
    }

    /// Wait [`Delays::before_send`], then write `data`.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn send(&mut self, data: impl AsRef<[u8]>) -> Result<usize> {
        std::thread::sleep(self.delays.before_send);
        self.write(data.as_ref())
    }

    /// Like [`send`](Self::send), followed by a newline.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn send_line(&mut self, data: impl AsRef<[u8]>) -> Result<usize> {
        let mut line = data.as_ref().to_vec();
        line.push(b'\n');
        self.send(line)
    }

    /// Writes are unbuffered, so there is nothing to flush.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Send `Ctrl+<c>`, e.g. `send_control('g')` rings the bell.
    ///
    /// Characters without a control code write nothing and return 0.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn send_control(&mut self, c: char) -> Result<usize> {
        match control_code(c) {
            Some(code) => self.write(&[code]),
            None => Ok(0),
        }
    }

    /// Send the end-of-file character.
    ///
    /// It only takes effect at the start of a line, so send a newline first
    /// if anything else has been written since.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn send_eof(&mut self) -> Result<usize> {
        let eof = self.control_chars.eof;
        self.write(&[eof])
    }

    /// Send the interrupt character; the line discipline turns it into
    /// `SIGINT` for the foreground process group.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn send_intr(&mut self) -> Result<usize> {
        let intr = self.control_chars.intr;
        self.write(&[intr])
    }

    // Terminal attributes

    /// Read the terminal's echo flag and remember it.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Unsupported`] where the terminal cannot be
    /// queried.
    pub fn get_echo(&mut self) -> Result<bool> {
        let echo = termios::get_echo(self.as_fd()?)?;
        self.echo = Some(echo);
        Ok(echo)
    }

    /// Turn terminal echo on or off.
    ///
    /// Not every platform allows this from the controlling side; disable
    /// echo at spawn time with [`PtyConfig::echo`] where it matters.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Unsupported`] where the terminal cannot be
    /// changed.
    pub fn set_echo(&mut self, enabled: bool) -> Result<()> {
        termios::set_echo(self.as_fd()?, enabled)?;
        self.echo = Some(enabled);
        Ok(())
    }

    /// The echo flag as last read or set, without a system call.
    #[must_use]
    pub const fn echo(&self) -> Option<bool> {
        self.echo
    }

    /// Poll until the child turns echo off, as programs do before asking
    /// for a password.
    ///
    /// Returns `false` if `timeout` elapses first; `None` waits forever.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`get_echo`](Self::get_echo).
    pub fn wait_no_echo(&mut self, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if !self.get_echo()? {
                return Ok(true);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(false);
            }
            std::thread::sleep(ECHO_POLL_INTERVAL);
        }
    }

    /// The terminal's window size.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Unsupported`] where the size cannot be queried.
    pub fn window_size(&self) -> Result<WindowSize> {
        termios::get_window_size(self.as_fd()?)
    }

    /// Resize the terminal; the child receives `SIGWINCH`.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Unsupported`] where the size cannot be set.
    pub fn set_window_size(&mut self, rows: u16, cols: u16) -> Result<()> {
        termios::set_window_size(self.as_fd()?, rows, cols)
    }

    // Process state

    /// Send `signal` to the child if it is still running.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Signal`] if delivery fails, and the errors of
    /// [`is_alive`](Self::is_alive).
    pub fn kill(&mut self, signal: PtySignal) -> Result<()> {
        if self.is_alive()? {
            self.deliver(signal)?;
        }
        Ok(())
    }

    pub(crate) fn deliver(&self, signal: PtySignal) -> Result<()> {
        let raw = signal.as_unix_signal();
        let sig = Signal::from_named_raw(raw).ok_or_else(|| {
            PtyError::Signal(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid signal",
            ))
        })?;

        tracing::trace!(pid = self.pid, signal = raw, "delivering signal");
        kill_process(self.reaper.pid(), sig)
            .map_err(|e| PtyError::Signal(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Whether the child is still running, reaping it if it has exited.
    ///
    /// Never blocks unless `blocking_reap_after_eof` was configured and end
    /// of file has been read.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Internal`] if the child was reaped elsewhere and
    /// [`PtyError::Stopped`] if it was stopped by job control.
    pub fn is_alive(&mut self) -> Result<bool> {
        let block = self.eof_reached && self.blocking_reap_after_eof;
        self.reaper.is_alive(block)
    }

    /// Block until the child exits and return how it ended.
    ///
    /// Output the child has not had read yet stays buffered in the terminal
    /// and can still be read afterwards. A child that was already reaped
    /// returns its recorded status.
    ///
    /// # Errors
    ///
    /// Same as [`is_alive`](Self::is_alive).
    pub fn wait(&mut self) -> Result<ExitStatus> {
        self.reaper.wait()
    }

    /// How the child ended, once it has been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.reaper.exit_status()
    }

    /// The exit code, if the child exited normally.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self.reaper.exit_status() {
            Some(status) => status.code(),
            None => None,
        }
    }

    /// The signal number, if the child was killed by one.
    #[must_use]
    pub const fn signal_status(&self) -> Option<i32> {
        match self.reaper.exit_status() {
            Some(status) => status.signal(),
            None => None,
        }
    }

    /// Whether the child has been reaped.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self.reaper.state(), ProcessState::Terminated(_))
    }

    pub(crate) fn release_fd(&mut self) -> Option<OwnedFd> {
        self.fd.take()
    }
}

/// Returns -1 once the handle is closed.
impl AsRawFd for PtyProcess {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }
}

impl PtyStream for PtyProcess {
    type Output = Vec<u8>;
    type Input = [u8];

    fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        Self::read(self, size)
    }

    fn read_line(&mut self) -> Result<Vec<u8>> {
        Self::read_line(self)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Self::write(self, data)
    }
}
