//! Shell runner unit tests

use std::time::Duration;

use dpagent::shell::{quote, run, run_args, run_with_stdin, spawn_streaming};

#[test]
fn quoting_follows_the_posix_rule() {
    assert_eq!(quote("simple"), "'simple'");
    assert_eq!(quote("two words"), "'two words'");
    assert_eq!(quote("it's"), r"'it'\''s'");
    assert_eq!(quote("a'b'c"), r"'a'\''b'\''c'");
    assert_eq!(quote("$(rm -rf /)"), "'$(rm -rf /)'");
    assert_eq!(quote(""), "''");
}

#[tokio::test]
async fn run_captures_trimmed_stdout() {
    let result = run("echo hello", Duration::from_secs(5)).await;
    assert!(result.success);
    assert_eq!(result.stdout, "hello");
    assert!(result.error.is_none());
}

#[tokio::test]
async fn quoted_values_survive_the_shell() {
    let cmd = format!("echo {}", quote("it's $HOME"));
    let result = run(&cmd, Duration::from_secs(5)).await;
    assert!(result.success);
    assert_eq!(result.stdout, "it's $HOME");
}

#[tokio::test]
async fn nonzero_exit_populates_error() {
    let result = run("exit 3", Duration::from_secs(5)).await;
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn stderr_is_captured_separately() {
    let result = run("echo out; echo err >&2", Duration::from_secs(5)).await;
    assert!(result.success);
    assert_eq!(result.stdout, "out");
    assert_eq!(result.stderr, "err");
}

#[tokio::test]
async fn deadline_kills_the_process() {
    let result = run("sleep 30", Duration::from_millis(200)).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn run_args_skips_the_shell() {
    let result = run_args("echo", &["$HOME"], Duration::from_secs(5)).await;
    assert!(result.success);
    // argv-style: no expansion
    assert_eq!(result.stdout, "$HOME");
}

#[tokio::test]
async fn stdin_is_piped() {
    let result = run_with_stdin("cat", &[], b"manifest body", Duration::from_secs(5)).await;
    assert!(result.success);
    assert_eq!(result.stdout, "manifest body");
}

#[tokio::test]
async fn streaming_delivers_lines_and_the_residual_tail() {
    let mut lines = Vec::new();
    let result = spawn_streaming(
        "sh",
        &["-c", "printf 'one\\ntwo\\ntail-without-newline'"],
        Duration::from_secs(5),
        |line| lines.push(line.to_string()),
    )
    .await;

    assert!(result.success);
    assert_eq!(lines, vec!["one", "two", "tail-without-newline"]);
}

#[tokio::test]
async fn streaming_merges_stderr() {
    let mut lines = Vec::new();
    let result = spawn_streaming(
        "sh",
        &["-c", "echo out; echo err >&2"],
        Duration::from_secs(5),
        |line| lines.push(line.to_string()),
    )
    .await;

    assert!(result.success);
    assert_eq!(lines.len(), 2);
    assert!(lines.contains(&"out".to_string()));
    assert!(lines.contains(&"err".to_string()));
}

#[tokio::test]
async fn streaming_reports_exit_failures() {
    let result = spawn_streaming(
        "sh",
        &["-c", "echo partial; exit 7"],
        Duration::from_secs(5),
        |_| {},
    )
    .await;

    assert!(!result.success);
    assert!(result.stdout.contains("partial"));
    assert!(result.error.is_some());
}
