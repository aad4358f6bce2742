//! Integration tests for spawning children in a PTY.

#![cfg(unix)]

use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use rust_ptyprocess::{
    Delays, ExecutableResolver, ExitStatus, PtyConfig, PtyError, PtyProcess, SearchPath,
};

fn config() -> PtyConfig {
    PtyConfig::builder().delays(Delays::none()).build()
}

fn read_to_eof(child: &mut PtyProcess) -> String {
    let mut out = Vec::new();
    loop {
        match child.read(1024) {
            Ok(chunk) => out.extend_from_slice(&chunk),
            Err(PtyError::Eof) => break,
            Err(e) => panic!("read failed: {e}"),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Pipe with both ends close-on-exec.
fn pipe() -> (OwnedFd, OwnedFd) {
    let mut fds: [RawFd; 2] = [0; 2];
    // SAFETY: `fds` has room for the two descriptors pipe() writes.
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    for fd in fds {
        // SAFETY: both descriptors were just created.
        unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
    }
    // SAFETY: pipe() returned two fresh descriptors owned by nobody else.
    unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
}

#[test]
fn environment_reaches_child() {
    let config = PtyConfig::builder()
        .delays(Delays::none())
        .env("FOO", "rebar")
        .build();
    let mut child = PtyProcess::spawn(["sh"], &config).unwrap();
    child.write(b"echo $FOO; exit 0\n").unwrap();

    let out = read_to_eof(&mut child);
    assert!(out.contains("rebar"), "{out:?}");
    assert_eq!(child.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn env_clear_gives_empty_environment() {
    let config = PtyConfig::builder()
        .delays(Delays::none())
        .env_clear()
        .env("ONLY", "this")
        .build();
    let mut child =
        PtyProcess::spawn(["sh", "-c", "echo \"[$ONLY][$HOME]\""], &config).unwrap();

    let out = read_to_eof(&mut child);
    assert!(out.contains("[this][]"), "{out:?}");
    assert_eq!(child.env().unwrap().len(), 1);
    child.wait().unwrap();
}

#[test]
fn quick_exit_does_not_fail_spawn() {
    for _ in 0..10 {
        let mut child = PtyProcess::spawn(["true"], &config()).unwrap();
        assert_eq!(child.wait().unwrap(), ExitStatus::Exited(0));
    }
}

#[test]
fn missing_command_is_reported() {
    let err = PtyProcess::spawn(["this-command-does-not-exist-3f9a"], &config()).unwrap_err();
    match err {
        PtyError::CommandNotFound { command } => {
            assert_eq!(command, "this-command-does-not-exist-3f9a");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = PtyProcess::spawn(["/nonexistent/bin/tool"], &config()).unwrap_err();
    assert!(matches!(err, PtyError::CommandNotFound { .. }));
}

#[test]
fn custom_resolver_is_used() {
    struct AlwaysSh;

    impl ExecutableResolver for AlwaysSh {
        fn resolve(&self, _name: &OsStr) -> Option<PathBuf> {
            SearchPath::from_env().resolve(OsStr::new("sh"))
        }
    }

    let mut child =
        PtyProcess::spawn_with(["not-a-shell", "-c", "echo resolved"], &config(), &AlwaysSh)
            .unwrap();
    assert!(read_to_eof(&mut child).contains("resolved"));
    assert!(child.argv()[0].to_string_lossy().ends_with("/sh"));
    child.wait().unwrap();
}

#[test]
fn passed_descriptors_survive_and_others_close() {
    let (passed_read, passed_write) = pipe();
    let (_other_read, other_write) = pipe();

    let passed = std::os::fd::AsRawFd::as_raw_fd(&passed_write);
    let other = std::os::fd::AsRawFd::as_raw_fd(&other_write);
    let script = format!(
        "echo through >&{passed}; if echo x 2>/dev/null >&{other}; then echo leaked; else echo closed; fi"
    );

    let config = PtyConfig::builder()
        .delays(Delays::none())
        .pass_fd(passed)
        .build();
    let mut child = PtyProcess::spawn(["sh", "-c", &script], &config).unwrap();
    drop(passed_write);

    let out = read_to_eof(&mut child);
    assert!(out.contains("closed"), "{out:?}");
    assert_eq!(child.wait().unwrap(), ExitStatus::Exited(0));

    let mut piped = String::new();
    File::from(passed_read).read_to_string(&mut piped).unwrap();
    assert_eq!(piped, "through\n");
}

#[test]
fn launch_metadata_is_kept() {
    let mut child = PtyProcess::spawn(["sh", "-c", "exit 0"], &config()).unwrap();
    assert_eq!(child.argv().len(), 3);
    assert_eq!(child.argv()[2], "exit 0");
    assert!(child.env().is_none());
    assert!(child.working_dir().is_none());
    child.wait().unwrap();
}

#[test]
fn child_output_survives_closed_parent_stdio() {
    // SAFETY: the forked test process only spawns, reads and exits.
    let pid = unsafe { libc::fork() };
    assert!(pid >= 0);
    if pid == 0 {
        // SAFETY: freeing 0 and 1 makes the terminal pair land on them.
        unsafe {
            libc::close(0);
            libc::close(1);
        }
        let code = match PtyProcess::spawn(["sh", "-c", "echo visible"], &config()) {
            Ok(mut child) => i32::from(!read_to_eof(&mut child).contains("visible")),
            Err(_) => 2,
        };
        // SAFETY: leaves the forked copy of the test harness without unwinding.
        unsafe { libc::_exit(code) };
    }

    let mut status = 0;
    // SAFETY: `pid` is our child and `status` is a valid out pointer.
    assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
    assert!(libc::WIFEXITED(status));
    assert_eq!(libc::WEXITSTATUS(status), 0);
}
