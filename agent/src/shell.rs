//! External process execution
//!
//! Every shell tool the agent drives (git, docker, kubectl, the site helper
//! scripts) goes through this module, which enforces deadlines, caps captured
//! output, and owns the single POSIX quoting rule for untrusted values.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Hard cap on captured output, per stream.
pub const MAX_CAPTURED_OUTPUT: usize = 10 * 1024 * 1024;

/// Marker appended when captured output exceeds the cap.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Grace between SIGTERM and SIGKILL once a deadline expires.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Outcome of one external process invocation
#[derive(Debug, Clone, Default)]
pub struct ShellResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

impl ShellResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// stdout and stderr joined for result logs
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// POSIX single-quote escaping: the value is wrapped in single quotes with
/// every embedded `'` rewritten to `'\''`. Every untrusted value that is
/// interpolated into a shell string MUST pass through here.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Run a shell command line under `sh -c`, capturing full output.
pub async fn run(cmd: &str, timeout: Duration) -> ShellResult {
    run_args("sh", &["-c", cmd], timeout).await
}

/// Run a program argv-style (no shell), capturing full output.
pub async fn run_args(program: &str, args: &[&str], timeout: Duration) -> ShellResult {
    let child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return ShellResult::failure(format!("failed to spawn {}: {}", program, e)),
    };

    capture(child, program, timeout).await
}

/// Run a program argv-style with `input` piped to its stdin.
pub async fn run_with_stdin(
    program: &str,
    args: &[&str],
    input: &[u8],
    timeout: Duration,
) -> ShellResult {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return ShellResult::failure(format!("failed to spawn {}: {}", program, e)),
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(input).await {
            warn!("Failed to write stdin to {}: {}", program, e);
        }
        // Dropping stdin closes the pipe so the child sees EOF.
    }

    capture(child, program, timeout).await
}

/// Spawn a program and stream its merged stdout+stderr line-by-line through
/// `on_line`. Lines are delivered on newline boundaries; a residual
/// unterminated tail is flushed when the process exits. Returns the capped,
/// accumulated output in `stdout`.
pub async fn spawn_streaming<F>(
    program: &str,
    args: &[&str],
    timeout: Duration,
    mut on_line: F,
) -> ShellResult
where
    F: FnMut(&str),
{
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return ShellResult::failure(format!("failed to spawn {}: {}", program, e)),
    };

    let (tx, mut rx) = mpsc::channel::<String>(256);
    if let Some(stdout) = child.stdout.take() {
        stream_lines(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        stream_lines(stderr, tx.clone());
    }
    drop(tx);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut collected = String::new();
    let mut truncated = false;

    loop {
        tokio::select! {
            maybe_line = rx.recv() => match maybe_line {
                Some(line) => {
                    on_line(&line);
                    if collected.len() < MAX_CAPTURED_OUTPUT {
                        if !collected.is_empty() {
                            collected.push('\n');
                        }
                        collected.push_str(&line);
                    } else {
                        truncated = true;
                    }
                }
                None => break, // both pipes closed
            },
            _ = &mut deadline => {
                terminate(&mut child, program).await;
                if truncated {
                    collected.push_str(TRUNCATION_MARKER);
                }
                return ShellResult {
                    success: false,
                    stdout: collected,
                    stderr: String::new(),
                    error: Some(format!(
                        "{} timed out after {}s",
                        program,
                        timeout.as_secs()
                    )),
                };
            }
        }
    }

    if truncated {
        collected.push_str(TRUNCATION_MARKER);
    }

    match child.wait().await {
        Ok(status) if status.success() => ShellResult {
            success: true,
            stdout: collected,
            stderr: String::new(),
            error: None,
        },
        Ok(status) => ShellResult {
            success: false,
            stdout: collected,
            stderr: String::new(),
            error: Some(format!("{} exited with {}", program, status)),
        },
        Err(e) => ShellResult {
            success: false,
            stdout: collected,
            stderr: String::new(),
            error: Some(format!("failed to wait for {}: {}", program, e)),
        },
    }
}

fn stream_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        // next_line yields a final unterminated line before EOF, which is
        // the residual-tail flush callers rely on.
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

async fn capture(mut child: Child, program: &str, timeout: Duration) -> ShellResult {
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    // Read both pipes concurrently with wait(): a child that fills the OS
    // pipe buffer would otherwise block on write and never exit.
    tokio::select! {
        (status, stdout, stderr) = async {
            tokio::join!(
                child.wait(),
                read_capped(&mut stdout_pipe),
                read_capped(&mut stderr_pipe),
            )
        } => {
            match status {
                Ok(status) if status.success() => ShellResult {
                    success: true,
                    stdout,
                    stderr,
                    error: None,
                },
                Ok(status) => ShellResult {
                    success: false,
                    stdout,
                    stderr,
                    error: Some(format!("{} exited with {}", program, status)),
                },
                Err(e) => ShellResult {
                    success: false,
                    stdout,
                    stderr,
                    error: Some(format!("failed to wait for {}: {}", program, e)),
                },
            }
        }
        _ = tokio::time::sleep(timeout) => {
            terminate(&mut child, program).await;
            ShellResult::failure(format!(
                "{} timed out after {}s",
                program,
                timeout.as_secs()
            ))
        }
    }
}

/// SIGTERM, a short grace, then SIGKILL.
async fn terminate(child: &mut Child, program: &str) {
    debug!("Terminating {} on deadline expiry", program);

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
        warn!("{} survived SIGTERM, sending SIGKILL", program);
    }

    let _ = child.kill().await;
}

async fn read_capped<R>(pipe: &mut Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = pipe else {
        return String::new();
    };

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < MAX_CAPTURED_OUTPUT {
                    let take = n.min(MAX_CAPTURED_OUTPUT - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    // Keep draining so the child never blocks on a full pipe.
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }

    let mut out = String::from_utf8_lossy(&buf).trim_end().to_string();
    if truncated {
        out.push_str(TRUNCATION_MARKER);
    }
    out
}
