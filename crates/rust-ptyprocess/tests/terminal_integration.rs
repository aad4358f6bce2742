//! Integration tests for terminal attributes and the controlling terminal.

#![cfg(unix)]

use std::time::Duration;

use rust_ptyprocess::{
    Delays, ExitStatus, PtyConfig, PtyError, PtyProcess, SessionSetup, WindowSize,
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

#[test]
fn echo_round_trip() {
    let mut child = PtyProcess::spawn(["cat"], &config()).unwrap();
    assert!(child.isatty());
    assert_eq!(child.echo(), None);

    assert!(child.get_echo().unwrap());
    child.set_echo(false).unwrap();
    assert!(!child.get_echo().unwrap());
    assert_eq!(child.echo(), Some(false));

    child.set_echo(true).unwrap();
    assert!(child.get_echo().unwrap());
}

#[test]
fn window_size_round_trip() {
    let mut child = PtyProcess::spawn(["cat"], &config()).unwrap();
    assert_eq!(child.window_size().unwrap(), WindowSize::new(24, 80));

    child.set_window_size(30, 100).unwrap();
    assert_eq!(child.window_size().unwrap(), WindowSize::new(30, 100));
}

#[test]
fn configured_size_is_visible_to_child() {
    let config = PtyConfig::builder()
        .delays(Delays::none())
        .window_size(40, 120)
        .build();
    let mut child = PtyProcess::spawn(["stty", "size"], &config).unwrap();

    assert_eq!(read_to_eof(&mut child).trim(), "40 120");
    assert_eq!(child.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn echo_disabled_at_spawn() {
    let config = PtyConfig::builder()
        .delays(Delays::none())
        .echo(false)
        .build();
    let mut child = PtyProcess::spawn(["cat"], &config).unwrap();

    assert!(child.wait_no_echo(None).unwrap());
    assert!(!child.get_echo().unwrap());

    child.send_line("secret").unwrap();
    // cat repeats the line once; without echo it is not doubled.
    assert_eq!(child.read_line().unwrap(), b"secret\r\n");
    child.send_eof().unwrap();
    assert_eq!(child.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn wait_no_echo_sees_child_change() {
    let mut child =
        PtyProcess::spawn(["sh", "-c", "sleep 0.3; stty -echo; sleep 5"], &config()).unwrap();
    assert!(child.wait_no_echo(Some(Duration::from_secs(5))).unwrap());
}

#[test]
fn wait_no_echo_times_out() {
    let mut child = PtyProcess::spawn(["cat"], &config()).unwrap();
    assert!(!child.wait_no_echo(Some(Duration::from_millis(300))).unwrap());
}

#[test]
fn controlling_terminal_is_attached() {
    for setup in [SessionSetup::Direct, SessionSetup::Probe] {
        let config = PtyConfig::builder()
            .delays(Delays::none())
            .session_setup(setup)
            .build();
        let mut child = PtyProcess::spawn(["sh", "-c", "echo ok > /dev/tty"], &config).unwrap();

        let out = read_to_eof(&mut child);
        assert!(out.contains("ok"), "{setup:?}: {out:?}");
        assert_eq!(child.wait().unwrap(), ExitStatus::Exited(0), "{setup:?}");
    }
}

#[cfg(target_os = "linux")]
#[test]
fn child_leads_its_own_session() {
    let mut child = PtyProcess::spawn(["sh", "-c", "cat /proc/$$/stat"], &config()).unwrap();
    let pid = child.pid();

    // Fields after the command name: state, ppid, pgrp, session.
    let out = read_to_eof(&mut child);
    let fields: Vec<&str> = out[out.rfind(')').unwrap() + 1..]
        .split_whitespace()
        .collect();
    let sid: i32 = fields[3].parse().unwrap();
    assert_eq!(sid, pid, "{out:?}");
    child.wait().unwrap();
}
