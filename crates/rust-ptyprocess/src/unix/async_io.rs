//! Tokio adapter for [`PtyProcess`].
//!
//! The terminal descriptor is switched to non-blocking mode and registered
//! with the reactor through [`AsyncFd`]. Reads, writes and waits then yield
//! to the runtime instead of blocking a worker thread.

use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use rustix::fs::{OFlags, fcntl_getfl, fcntl_setfl};
use rustix::io::Errno;
use tokio::io::unix::AsyncFd;

use crate::error::{PtyError, Result};
use crate::traits::ExitStatus;
use crate::unix::process::{ECHO_POLL_INTERVAL, PtyProcess};

/// How often [`AsyncPtyProcess::wait`] checks on the child.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A [`PtyProcess`] driven from async code.
///
/// Requires a Tokio runtime with I/O and time enabled.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use rust_ptyprocess::{AsyncPtyProcess, PtyConfig, PtyProcess};
///
/// # async fn run() -> rust_ptyprocess::Result<()> {
/// let child = PtyProcess::spawn(["cat"], &PtyConfig::default())?;
/// let mut child = AsyncPtyProcess::new(child)?;
/// child.send_line(b"hello").await?;
/// let echoed = child.read_timeout(1024, Duration::from_secs(1)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncPtyProcess {
    // Declared first: deregistration must happen before `inner` closes the fd.
    io: AsyncFd<RawFd>,
    inner: PtyProcess,
}

impl AsyncPtyProcess {
    /// Register the handle's terminal with the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Closed`] for a closed handle, or an I/O error if
    /// the descriptor cannot be registered.
    pub fn new(inner: PtyProcess) -> Result<Self> {
        let fd = inner.as_fd()?;
        let flags = fcntl_getfl(fd)?;
        fcntl_setfl(fd, flags | OFlags::NONBLOCK)?;

        let io = AsyncFd::new(inner.as_raw_fd())?;
        Ok(Self { io, inner })
    }

    /// The wrapped handle.
    #[must_use]
    pub const fn inner(&self) -> &PtyProcess {
        &self.inner
    }

    /// The wrapped handle, mutably. Its blocking reads would return
    /// `WouldBlock` while the descriptor is non-blocking.
    pub fn inner_mut(&mut self) -> &mut PtyProcess {
        &mut self.inner
    }

    /// Deregister the terminal and restore blocking mode.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the descriptor flags cannot be restored.
    pub fn into_inner(self) -> Result<PtyProcess> {
        let Self { io, inner } = self;
        drop(io);

        if let Ok(fd) = inner.as_fd() {
            let flags = fcntl_getfl(fd)?;
            fcntl_setfl(fd, flags - OFlags::NONBLOCK)?;
        }
        Ok(inner)
    }

    /// Read at most `size` bytes once the terminal is readable.
    ///
    /// # Errors
    ///
    /// Same as [`PtyProcess::read`].
    pub async fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        if self.inner.is_closed() {
            return Err(PtyError::Closed);
        }
        if size == 0 {
            return Ok(Vec::new());
        }
        if let Some(chunk) = self.inner.take_pending_upto(size) {
            return Ok(chunk);
        }
        if self.inner.eof() {
            return Err(PtyError::Eof);
        }

        loop {
            let mut guard = self.io.readable().await?;
            match self.inner.read_chunk(size) {
                Err(e) if e.is_would_block() => guard.clear_ready(),
                other => return other,
            }
        }
    }

    /// [`read`](Self::read), giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Timeout`] if nothing arrived in time.
    pub async fn read_timeout(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        let pid = self.inner.pid();
        tokio::time::timeout(timeout, self.read(size))
            .await
            .map_err(|_| {
                tracing::debug!(pid, ?timeout, "read timed out");
                PtyError::Timeout
            })?
    }

    /// Read until a newline, or until the stream ends after a partial line.
    ///
    /// # Errors
    ///
    /// Same as [`PtyProcess::read_line`].
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let chunk = match self.read(1024).await {
                Ok(chunk) => chunk,
                Err(PtyError::Eof) if !line.is_empty() => return Ok(line),
                Err(e) => return Err(e),
            };
            if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&chunk[..=pos]);
                self.inner.push_pending(&chunk[pos + 1..]);
                return Ok(line);
            }
            line.extend_from_slice(&chunk);
        }
    }

    /// Write all of `data` once the terminal is writable.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::Closed`] for a closed handle or the write error.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            let mut guard = self.io.writable().await?;
            match rustix::io::write(self.inner.as_fd()?, &data[written..]) {
                Ok(n) => written += n,
                Err(Errno::AGAIN) => guard.clear_ready(),
                Err(Errno::INTR) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Wait [`Delays::before_send`](crate::Delays::before_send), then write
    /// `data`.
    ///
    /// # Errors
    ///
    /// Same as [`write_all`](Self::write_all).
    pub async fn send(&mut self, data: impl AsRef<[u8]>) -> Result<usize> {
        let data = data.as_ref();
        tokio::time::sleep(self.inner.delays.before_send).await;
        self.write_all(data).await?;
        Ok(data.len())
    }

    /// Like [`send`](Self::send), followed by a newline.
    ///
    /// # Errors
    ///
    /// Same as [`write_all`](Self::write_all).
    pub async fn send_line(&mut self, data: impl AsRef<[u8]>) -> Result<usize> {
        let mut line = data.as_ref().to_vec();
        line.push(b'\n');
        self.send(line).await
    }

    /// See [`PtyProcess::is_alive`].
    ///
    /// # Errors
    ///
    /// Same as [`PtyProcess::is_alive`].
    pub fn is_alive(&mut self) -> Result<bool> {
        self.inner.is_alive()
    }

    /// Wait for the child to exit without blocking the runtime.
    ///
    /// # Errors
    ///
    /// Same as [`PtyProcess::wait`].
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        while self.inner.is_alive()? {
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
        self.inner.wait()
    }

    /// Poll until the child disables echo; `None` waits forever.
    ///
    /// # Errors
    ///
    /// Same as [`PtyProcess::get_echo`].
    pub async fn wait_no_echo(&mut self, timeout: Option<Duration>) -> Result<bool> {
        let poll = async {
            loop {
                if !self.inner.get_echo()? {
                    return Ok::<_, PtyError>(true);
                }
                tokio::time::sleep(ECHO_POLL_INTERVAL).await;
            }
        };

        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, poll)
                .await
                .unwrap_or(Ok(false)),
            None => poll.await,
        }
    }
}
