//! Configuration types for spawning and driving a PTY process.
//!
//! This module provides [`PtyConfig`] for describing how a child is launched,
//! [`Delays`] for the kernel settle times used around sends, closes and
//! signals, and [`PtySignal`] for naming the signals the handle delivers.

use std::collections::HashMap;
use std::ffi::OsString;
use std::os::fd::RawFd;
use std::path::PathBuf;
use std::time::Duration;

use crate::unix::ControlChars;

/// Prefix of the environment variables read by [`Delays::from_env`].
pub const ENV_PREFIX: &str = "PTYPROCESS";

/// Configuration for spawning a child in a PTY.
///
/// # Example
///
/// ```
/// use rust_ptyprocess::PtyConfig;
///
/// let config = PtyConfig::builder()
///     .working_directory("/tmp")
///     .env("TERM", "dumb")
///     .window_size(24, 80)
///     .echo(false)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,

    /// Complete environment for the child process.
    /// If None, inherits from the parent process.
    pub env: Option<HashMap<OsString, OsString>>,

    /// Additional environment variables (merged over the base environment).
    pub env_add: HashMap<OsString, OsString>,

    /// Environment variables to remove from the base environment.
    pub env_remove: Vec<OsString>,

    /// Initial window size, applied in both the child and the parent.
    pub window_size: WindowSize,

    /// Whether terminal echo stays enabled in the child.
    pub echo: bool,

    /// Descriptors the child keeps open across exec.
    pub pass_fds: Vec<RawFd>,

    /// Settle times used by the handle.
    pub delays: Delays,

    /// How the child acquires its controlling terminal.
    pub session_setup: SessionSetup,

    /// EOF/INTR bytes for `send_eof`/`send_intr`.
    /// If None, they are inherited from this process's terminal.
    pub control_chars: Option<ControlChars>,

    /// Use a blocking reap in `is_alive` once EOF has been read.
    ///
    /// Some platforms only report a defunct child's status reliably after its
    /// output has been drained; enabling this makes `is_alive` block there.
    pub blocking_reap_after_eof: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            env: None,
            env_add: HashMap::new(),
            env_remove: Vec::new(),
            window_size: WindowSize::default(),
            echo: true,
            pass_fds: Vec::new(),
            delays: Delays::default(),
            session_setup: SessionSetup::platform_default(),
            control_chars: None,
            blocking_reap_after_eof: false,
        }
    }
}

impl PtyConfig {
    /// Create a new builder for `PtyConfig`.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::new()
    }

    /// Create a new `PtyConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the effective environment for the child process.
    ///
    /// This merges the base environment (inherited or explicit), adds
    /// variables from `env_add`, and removes variables from `env_remove`.
    #[must_use]
    pub fn effective_env(&self) -> HashMap<OsString, OsString> {
        let mut env = self
            .env
            .clone()
            .unwrap_or_else(|| std::env::vars_os().collect());

        env.extend(self.env_add.clone());

        for key in &self.env_remove {
            env.remove(key);
        }

        env
    }

    /// Whether the caller changed the environment in any way.
    #[must_use]
    pub fn has_custom_env(&self) -> bool {
        self.env.is_some() || !self.env_add.is_empty() || !self.env_remove.is_empty()
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    config: PtyConfig,
}

impl PtyConfigBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory for the child process.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Start from an empty environment instead of the inherited one.
    #[must_use]
    pub fn env_clear(mut self) -> Self {
        self.config.env = Some(HashMap::new());
        self
    }

    /// Replace the environment entirely.
    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.config.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env_add.insert(key.into(), value.into());
        self
    }

    /// Remove an environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.config.env_remove.push(key.into());
        self
    }

    /// Set the initial window size.
    #[must_use]
    pub const fn window_size(mut self, rows: u16, cols: u16) -> Self {
        self.config.window_size = WindowSize::new(rows, cols);
        self
    }

    /// Set whether terminal echo is enabled in the child.
    #[must_use]
    pub const fn echo(mut self, value: bool) -> Self {
        self.config.echo = value;
        self
    }

    /// Keep a descriptor open in the child.
    #[must_use]
    pub fn pass_fd(mut self, fd: RawFd) -> Self {
        self.config.pass_fds.push(fd);
        self
    }

    /// Set the settle times.
    #[must_use]
    pub const fn delays(mut self, delays: Delays) -> Self {
        self.config.delays = delays;
        self
    }

    /// Choose how the controlling terminal is attached.
    #[must_use]
    pub const fn session_setup(mut self, setup: SessionSetup) -> Self {
        self.config.session_setup = setup;
        self
    }

    /// Use fixed EOF/INTR bytes instead of inheriting them.
    #[must_use]
    pub const fn control_chars(mut self, chars: ControlChars) -> Self {
        self.config.control_chars = Some(chars);
        self
    }

    /// Use a blocking reap in `is_alive` once EOF has been read.
    #[must_use]
    pub const fn blocking_reap_after_eof(mut self, value: bool) -> Self {
        self.config.blocking_reap_after_eof = value;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.config
    }
}

/// Kernel settle times used by the process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    /// Pause before `send`/`send_line` write. Most Linux machines don't
    /// like this below 30 ms.
    pub before_send: Duration,
    /// Pause after closing the terminal, before checking the child.
    pub after_close: Duration,
    /// Pause after each signal of the termination sequence.
    pub after_terminate: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            before_send: Duration::from_millis(50),
            after_close: Duration::from_millis(100),
            after_terminate: Duration::from_millis(100),
        }
    }
}

impl Delays {
    /// All delays set to zero.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            before_send: Duration::ZERO,
            after_close: Duration::ZERO,
            after_terminate: Duration::ZERO,
        }
    }

    /// Defaults overridden by `PTYPROCESS_DELAY_*_MS` environment variables.
    ///
    /// Unset or unparsable variables keep the default value.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            before_send: env_millis("DELAY_BEFORE_SEND_MS").unwrap_or(defaults.before_send),
            after_close: env_millis("DELAY_AFTER_CLOSE_MS").unwrap_or(defaults.after_close),
            after_terminate: env_millis("DELAY_AFTER_TERMINATE_MS")
                .unwrap_or(defaults.after_terminate),
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    let var_name = format!("{ENV_PREFIX}_{name}");
    std::env::var(&var_name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// How the child process acquires the PTY as its controlling terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSetup {
    /// `setsid()` followed by `TIOCSCTTY` on the subordinate.
    Direct,
    /// Detach, `setsid()`, then attach by opening the device, verifying each
    /// step with `/dev/tty` probes.
    Probe,
}

impl SessionSetup {
    /// The strategy for the target platform.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(any(target_os = "solaris", target_os = "illumos", target_os = "aix")) {
            Self::Probe
        } else {
            Self::Direct
        }
    }
}

impl Default for SessionSetup {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Signals the handle delivers to its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PtySignal {
    /// Hangup signal (terminal closed). SIGHUP (1)
    Hangup,
    /// Interrupt signal (Ctrl+C). SIGINT (2)
    Interrupt,
    /// Quit signal (Ctrl+\). SIGQUIT (3)
    Quit,
    /// Kill signal (cannot be caught). SIGKILL (9)
    Kill,
    /// Terminate signal. SIGTERM (15)
    Terminate,
    /// Continue a stopped process. SIGCONT
    Continue,
    /// Window size change. SIGWINCH
    WindowChange,
    /// User-defined signal 1. SIGUSR1
    User1,
    /// User-defined signal 2. SIGUSR2
    User2,
}

impl PtySignal {
    /// Get the Unix signal number.
    #[must_use]
    pub const fn as_unix_signal(self) -> i32 {
        match self {
            Self::Hangup => libc::SIGHUP,
            Self::Interrupt => libc::SIGINT,
            Self::Quit => libc::SIGQUIT,
            Self::Kill => libc::SIGKILL,
            Self::Terminate => libc::SIGTERM,
            Self::Continue => libc::SIGCONT,
            Self::WindowChange => libc::SIGWINCH,
            Self::User1 => libc::SIGUSR1,
            Self::User2 => libc::SIGUSR2,
        }
    }
}

/// Window size of the PTY, in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of rows (lines).
    pub rows: u16,
    /// Number of columns (characters per line).
    pub cols: u16,
}

impl WindowSize {
    /// Create a new window size with the given dimensions.
    #[must_use]
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

impl From<(u16, u16)> for WindowSize {
    fn from((rows, cols): (u16, u16)) -> Self {
        Self::new(rows, cols)
    }
}

impl From<WindowSize> for (u16, u16) {
    fn from(size: WindowSize) -> Self {
        (size.rows, size.cols)
    }
}
