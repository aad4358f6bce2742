//! Integration tests for the Tokio adapter.

#![cfg(unix)]

use std::time::Duration;

use rust_ptyprocess::{AsyncPtyProcess, Delays, ExitStatus, PtyConfig, PtyProcess};

fn spawn(argv: &[&str]) -> AsyncPtyProcess {
    let config = PtyConfig::builder().delays(Delays::none()).build();
    AsyncPtyProcess::new(PtyProcess::spawn(argv, &config).unwrap()).unwrap()
}

#[tokio::test]
async fn silent_child_times_out() {
    let mut child = spawn(&["cat"]);
    let err = child
        .read_timeout(1024, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn wait_reports_exit_code() {
    let mut child = spawn(&["sh", "-c", "sleep 0.1; exit 4"]);
    assert_eq!(child.wait().await.unwrap(), ExitStatus::Exited(4));
    assert!(!child.is_alive().unwrap());
}

#[tokio::test]
async fn conversation_with_cat() {
    let mut child = spawn(&["cat"]);

    child.send_line("one").await.unwrap();
    child.write_all(b"two\n").await.unwrap();

    let mut lines = Vec::new();
    while lines.len() < 4 {
        let line = tokio::time::timeout(Duration::from_secs(5), child.read_line())
            .await
            .unwrap()
            .unwrap();
        lines.push(String::from_utf8(line).unwrap());
    }
    assert!(lines.iter().filter(|l| l.starts_with("one")).count() == 2);
    assert!(lines.iter().filter(|l| l.starts_with("two")).count() == 2);

    let mut child = child.into_inner().unwrap();
    child.close(true).unwrap();
}

#[tokio::test]
async fn wait_no_echo_sees_echo_off() {
    let mut child = spawn(&["sh", "-c", "stty -echo; sleep 5"]);
    assert!(
        child
            .wait_no_echo(Some(Duration::from_secs(5)))
            .await
            .unwrap()
    );
}
