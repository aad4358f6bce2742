//! Starting a child process on a fresh PTY.
//!
//! Everything the child needs is prepared before `fork()`: the child side
//! only issues system calls on data that already exists, then execs or
//! exits. Failures in the child are reported as one line on the terminal
//! followed by exit status 1, or 127 when `execve` itself fails.

use std::ffi::{CString, OsStr, OsString};
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::ffi::OsStrExt;

use rustix::process::{Resource, getrlimit};

use crate::config::{PtyConfig, SessionSetup, WindowSize};
use crate::error::{PtyError, Result};
use crate::resolve::{ExecutableResolver, SearchPath};
use crate::unix::establish::ControllingTerminal;
use crate::unix::process::PtyProcess;
use crate::unix::pty::PtyPair;
use crate::unix::termios;

/// Descriptor sweep bound when `RLIMIT_NOFILE` is unlimited.
const FALLBACK_FD_LIMIT: RawFd = 4096;

/// Exit status of a child whose `execve` failed.
pub const EXEC_FAILED: i32 = 127;

/// Exit status of a child that failed before `execve`.
pub const SETUP_FAILED: i32 = 1;

/// Which side of a `fork()` this is.
enum Forked {
    Child,
    Parent(i32),
}

fn fork() -> Result<Forked> {
    // SAFETY: the child branch only runs `run_child`, which performs no
    // allocation and ends in `execve` or `_exit`.
    match unsafe { libc::fork() } {
        -1 => Err(PtyError::Spawn(io::Error::last_os_error())),
        0 => Ok(Forked::Child),
        pid => Ok(Forked::Parent(pid)),
    }
}

impl PtyProcess {
    /// Start `argv` in a new PTY, resolving `argv[0]` on the search path.
    ///
    /// The search path is `PATH` from the configured environment, falling
    /// back to this process's own.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError::InvalidArgument`] for an empty `argv` or an
    /// argument, environment entry or directory containing a NUL byte,
    /// [`PtyError::CommandNotFound`] if `argv[0]` does not resolve, and
    /// [`PtyError::Create`] / [`PtyError::Spawn`] if the PTY or the process
    /// cannot be created. Failures after the fork surface as the child's
    /// output and exit status.
    pub fn spawn<I, S>(argv: I, config: &PtyConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let resolver = config
            .effective_env()
            .remove(OsStr::new("PATH"))
            .map_or_else(SearchPath::from_env, SearchPath::new);
        Self::spawn_with(argv, config, &resolver)
    }

    /// Like [`spawn`](Self::spawn), with a caller-supplied resolver.
    ///
    /// # Errors
    ///
    /// Same as [`spawn`](Self::spawn).
    pub fn spawn_with<I, S, R>(argv: I, config: &PtyConfig, resolver: &R) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        R: ExecutableResolver + ?Sized,
    {
        let mut argv: Vec<OsString> = argv
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();

        let program = {
            let command = argv
                .first()
                .ok_or(PtyError::InvalidArgument { what: "argv" })?;
            resolver
                .resolve(command)
                .ok_or_else(|| PtyError::CommandNotFound {
                    command: command.to_string_lossy().into_owned(),
                })?
        };
        argv[0] = program.into_os_string();

        let mut env: Vec<(OsString, OsString)> = config.effective_env().into_iter().collect();
        env.sort();

        let launch = Launch::new(&argv, &env, config)?;
        let pair = PtyPair::open()?;
        let terminal = ControllingTerminal::resolve(pair.subordinate.as_fd())
            .or_else(|_| ControllingTerminal::from_path(&pair.subordinate_path))?;

        match fork()? {
            Forked::Child => run_child(&launch, &terminal, &pair),
            Forked::Parent(pid) => {
                let PtyPair {
                    controller,
                    subordinate,
                    ..
                } = pair;
                drop(subordinate);

                tracing::debug!(pid, program = ?argv[0], "spawned child");

                let env = config.has_custom_env().then_some(env);
                let mut process = Self::new(pid, controller, argv, env, config)?;

                let size = config.window_size;
                match process.set_window_size(size.rows, size.cols) {
                    Err(e) if !e.is_unsupported() => return Err(e),
                    _ => {}
                }
                Ok(process)
            }
        }
    }
}

/// Arguments for `execve` and the child's setup, as C data.
struct Launch {
    program: CString,
    _argv: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>,
    _envp: Vec<CString>,
    envp_ptrs: Vec<*const libc::c_char>,
    cwd: Option<CString>,
    pass_fds: Vec<RawFd>,
    fd_limit: RawFd,
    window_size: WindowSize,
    echo: bool,
    session_setup: SessionSetup,
}

impl Launch {
    fn new(argv: &[OsString], env: &[(OsString, OsString)], config: &PtyConfig) -> Result<Self> {
        let program = c_string(&argv[0], "argv")?;
        let argv = argv
            .iter()
            .map(|arg| c_string(arg, "argv"))
            .collect::<Result<Vec<_>>>()?;

        let envp = env
            .iter()
            .map(|(key, value)| {
                let key = key.as_bytes();
                if key.is_empty() || key.contains(&b'=') {
                    return Err(PtyError::InvalidArgument {
                        what: "environment variable name",
                    });
                }
                let mut entry = Vec::with_capacity(key.len() + value.len() + 1);
                entry.extend_from_slice(key);
                entry.push(b'=');
                entry.extend_from_slice(value.as_bytes());
                CString::new(entry).map_err(|_| PtyError::InvalidArgument {
                    what: "environment",
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let cwd = config
            .working_directory
            .as_ref()
            .map(|dir| c_string(dir.as_os_str(), "working directory"))
            .transpose()?;

        let mut pass_fds: Vec<RawFd> = config
            .pass_fds
            .iter()
            .copied()
            .filter(|&fd| fd > 2)
            .collect();
        pass_fds.sort_unstable();
        pass_fds.dedup();

        Ok(Self {
            program,
            argv_ptrs: null_terminated(&argv),
            _argv: argv,
            envp_ptrs: null_terminated(&envp),
            _envp: envp,
            cwd,
            pass_fds,
            fd_limit: descriptor_limit(),
            window_size: config.window_size,
            echo: config.echo,
            session_setup: config.session_setup,
        })
    }
}

fn c_string(value: &OsStr, what: &'static str) -> Result<CString> {
    CString::new(value.as_bytes()).map_err(|_| PtyError::InvalidArgument { what })
}

fn null_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

fn descriptor_limit() -> RawFd {
    getrlimit(Resource::Nofile)
        .current
        .and_then(|n| RawFd::try_from(n).ok())
        .unwrap_or(FALLBACK_FD_LIMIT)
}

/// The child side of the fork. Never returns.
fn run_child(launch: &Launch, terminal: &ControllingTerminal, pair: &PtyPair) -> ! {
    let tty = pair.subordinate.as_raw_fd();

    // SAFETY: closes this process's copy of the controlling side; the
    // `OwnedFd` is never dropped here because the child execs or exits.
    unsafe { libc::close(pair.controller.as_raw_fd()) };

    // SAFETY: `tty` stays open until it is replaced by the standard streams.
    let tty_fd = unsafe { BorrowedFd::borrow_raw(tty) };
    if let Err(e) = terminal.attach(launch.session_setup, tty_fd) {
        fail(tty, e.step().as_bytes(), e.raw_os_error(), SETUP_FAILED);
    }

    for target in 0..=2 {
        // SAFETY: both descriptors are valid; dup2 has no memory effects.
        if unsafe { libc::dup2(tty, target) } == -1 {
            fail(tty, b"dup2", last_errno(), SETUP_FAILED);
        }
    }
    if tty > 2 {
        // SAFETY: the terminal is now reachable through 0, 1 and 2.
        unsafe { libc::close(tty) };
    } else {
        // dup2 onto itself keeps close-on-exec; the stream must survive exec.
        // SAFETY: `tty` is open; F_SETFD only changes descriptor flags.
        if unsafe { libc::fcntl(tty, libc::F_SETFD, 0) } == -1 {
            fail(tty, b"fcntl", last_errno(), SETUP_FAILED);
        }
    }

    // SAFETY: descriptor 0 was just made a copy of the terminal.
    let stdin = unsafe { BorrowedFd::borrow_raw(0) };

    let size = launch.window_size;
    if let Err(e) = termios::set_window_size(stdin, size.rows, size.cols) {
        if !e.is_unsupported() {
            fail(2, b"set window size", os_error(&e), SETUP_FAILED);
        }
    }

    if !launch.echo {
        if let Err(e) = termios::set_echo(stdin, false) {
            if !e.is_unsupported() {
                fail(2, b"disable echo", os_error(&e), SETUP_FAILED);
            }
        }
    }

    close_descriptors(&launch.pass_fds, launch.fd_limit);

    if let Some(cwd) = &launch.cwd {
        // SAFETY: `cwd` is a NUL-terminated string prepared before the fork.
        if unsafe { libc::chdir(cwd.as_ptr()) } == -1 {
            fail(2, b"chdir", last_errno(), SETUP_FAILED);
        }
    }

    // SAFETY: all three arrays are NUL-terminated and point at strings
    // owned by `launch`, which outlives the call.
    unsafe {
        libc::execve(
            launch.program.as_ptr(),
            launch.argv_ptrs.as_ptr(),
            launch.envp_ptrs.as_ptr(),
        );
    }
    fail(2, b"exec", last_errno(), EXEC_FAILED)
}

fn os_error(e: &PtyError) -> Option<i32> {
    match e {
        PtyError::Io(source) | PtyError::Unsupported { source, .. } => source.raw_os_error(),
        _ => None,
    }
}

fn last_errno() -> Option<i32> {
    io::Error::last_os_error().raw_os_error()
}

/// Close every descriptor from 3 up, except `keep` (sorted), and clear
/// `FD_CLOEXEC` on the ones kept.
fn close_descriptors(keep: &[RawFd], limit: RawFd) {
    let mut low = 3;
    for &fd in keep {
        // SAFETY: plain fcntl calls on a descriptor number; no memory effects.
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            if flags != -1 {
                libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC);
            }
        }
        if fd > low {
            close_range(low, fd - 1, limit);
        }
        low = fd + 1;
    }
    close_range(low, RawFd::MAX, limit);
}

fn close_range(low: RawFd, high: RawFd, limit: RawFd) {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: close_range takes two descriptor numbers and flags.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_close_range,
                low as libc::c_uint,
                high as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        if rc == 0 {
            return;
        }
    }

    for fd in low..=high.min(limit - 1) {
        // SAFETY: closing a descriptor number that may not be open is harmless.
        unsafe { libc::close(fd) };
    }
}

/// Write one diagnostic line to `fd` and exit with `code`.
fn fail(fd: RawFd, step: &[u8], errno: Option<i32>, code: i32) -> ! {
    let mut line = DiagnosticLine::new();
    line.push(b"rust-ptyprocess: ");
    line.push(step);
    line.push(b" failed");
    if let Some(errno) = errno {
        line.push(b": errno ");
        line.push_decimal(errno.unsigned_abs());
    }
    line.push(b"\n");

    let bytes = line.as_bytes();
    // SAFETY: writes from a stack buffer, then exits without running any
    // destructors or atexit handlers inherited from the parent.
    unsafe {
        libc::write(fd, bytes.as_ptr().cast(), bytes.len());
        libc::_exit(code)
    }
}

/// Fixed-size line buffer; the child must not allocate.
struct DiagnosticLine {
    buf: [u8; 128],
    len: usize,
}

impl DiagnosticLine {
    const fn new() -> Self {
        Self {
            buf: [0; 128],
            len: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.buf.len() - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
    }

    fn push_decimal(&mut self, mut value: u32) {
        let mut digits = [0u8; 10];
        let mut start = digits.len();
        loop {
            start -= 1;
            digits[start] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        self.push(&digits[start..]);
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delays;
    use crate::traits::ExitStatus;
    use std::path::{Path, PathBuf};

    fn quiet() -> PtyConfig {
        PtyConfig::builder().delays(Delays::none()).build()
    }

    fn output(child: &mut PtyProcess) -> String {
        let mut out = Vec::new();
        while let Ok(chunk) = child.read(1024) {
            out.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    struct Fixed(PathBuf);

    impl ExecutableResolver for Fixed {
        fn resolve(&self, _name: &OsStr) -> Option<PathBuf> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn diagnostic_line_format() {
        let mut line = DiagnosticLine::new();
        line.push(b"exec failed: errno ");
        line.push_decimal(13);
        assert_eq!(line.as_bytes(), b"exec failed: errno 13");

        let mut zero = DiagnosticLine::new();
        zero.push_decimal(0);
        assert_eq!(zero.as_bytes(), b"0");
    }

    #[test]
    fn diagnostic_line_truncates() {
        let mut line = DiagnosticLine::new();
        line.push(&[b'x'; 200]);
        line.push(b"tail");
        assert_eq!(line.as_bytes().len(), 128);
    }

    #[test]
    fn empty_argv_is_rejected() {
        let err = PtyProcess::spawn(Vec::<&str>::new(), &quiet()).unwrap_err();
        assert!(matches!(err, PtyError::InvalidArgument { what: "argv" }));
    }

    #[test]
    fn nul_bytes_are_rejected_before_fork() {
        let err = PtyProcess::spawn(["sh", "-c", "echo\0x"], &quiet()).unwrap_err();
        assert!(matches!(err, PtyError::InvalidArgument { what: "argv" }));

        let config = PtyConfig::builder().env("BAD", "a\0b").build();
        let err = PtyProcess::spawn(["true"], &config).unwrap_err();
        assert!(matches!(err, PtyError::InvalidArgument { .. }));

        let config = PtyConfig::builder().working_directory("/tmp\0").build();
        let err = PtyProcess::spawn(["true"], &config).unwrap_err();
        assert!(matches!(
            err,
            PtyError::InvalidArgument {
                what: "working directory"
            }
        ));
    }

    #[test]
    fn env_name_with_equals_is_rejected() {
        let config = PtyConfig::builder().env("A=B", "c").build();
        let err = PtyProcess::spawn(["true"], &config).unwrap_err();
        assert!(matches!(
            err,
            PtyError::InvalidArgument {
                what: "environment variable name"
            }
        ));
    }

    #[test]
    fn argv0_is_resolved() {
        let mut child = PtyProcess::spawn(["sh", "-c", "echo $0"], &quiet()).unwrap();
        let program = child.argv()[0].clone();
        assert!(Path::new(&program).is_absolute());

        let out = output(&mut child);
        assert!(out.contains(program.to_str().unwrap()), "{out:?}");
        child.wait().unwrap();
    }

    #[test]
    fn exec_failure_exits_127() {
        let mut child =
            PtyProcess::spawn_with(["anything"], &quiet(), &Fixed("/dev/null".into())).unwrap();

        let out = output(&mut child);
        assert!(out.contains("rust-ptyprocess: exec failed"), "{out:?}");
        assert_eq!(child.wait().unwrap(), ExitStatus::Exited(EXEC_FAILED));
    }

    #[test]
    fn chdir_failure_exits_1() {
        let config = PtyConfig::builder()
            .delays(Delays::none())
            .working_directory("/nonexistent/rust-ptyprocess")
            .build();
        let mut child = PtyProcess::spawn(["true"], &config).unwrap();

        let out = output(&mut child);
        assert!(out.contains("chdir failed"), "{out:?}");
        assert_eq!(child.wait().unwrap(), ExitStatus::Exited(SETUP_FAILED));
    }

    #[test]
    fn working_directory_is_applied() {
        let config = PtyConfig::builder()
            .delays(Delays::none())
            .working_directory("/")
            .build();
        let mut child = PtyProcess::spawn(["sh", "-c", "pwd"], &config).unwrap();
        assert_eq!(output(&mut child).trim_end(), "/");
        child.wait().unwrap();
    }

    #[test]
    fn path_from_config_env_is_searched() {
        let config = PtyConfig::builder()
            .delays(Delays::none())
            .env("PATH", "/nonexistent")
            .build();
        let err = PtyProcess::spawn(["sh"], &config).unwrap_err();
        assert!(matches!(err, PtyError::CommandNotFound { .. }));
    }
}
