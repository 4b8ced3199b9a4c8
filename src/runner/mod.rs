//! External tool invocation.
//!
//! Every tool is a black box: we hand it a path, wait for it with a
//! wall-clock limit, and collect its output. Nothing here retries.

pub mod pylint;
pub mod semgrep;

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How a single tool invocation ended.
#[derive(Debug)]
pub enum ToolOutcome {
    /// The process exited on its own (with any status).
    Completed {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    /// The process was killed after exceeding the timeout.
    TimedOut,
    /// The process could not be spawned or waited on.
    Failed(String),
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `command` to completion, killing it after `timeout`.
///
/// Stdout and stderr are drained on helper threads while the child runs
/// so a tool that writes more than a pipe buffer cannot stall.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> ToolOutcome {
    let start = Instant::now();

    let mut child = match command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return ToolOutcome::Failed(format!("failed to spawn: {}", e)),
    };

    let stdout_reader = child.stdout.take().map(drain);
    let stderr_reader = child.stderr.take().map(drain);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    reap(&mut child);
                    // Reader threads are detached: worker processes forked by
                    // the tool may keep the pipes open past the kill.
                    return ToolOutcome::TimedOut;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                reap(&mut child);
                return ToolOutcome::Failed(format!("failed to wait: {}", e));
            }
        }
    };

    ToolOutcome::Completed {
        status,
        stdout: join(stdout_reader),
        stderr: join(stderr_reader),
    }
}

/// Kill the child and wait on it so it does not linger as a zombie.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        match run_with_timeout(&mut cmd, Duration::from_secs(5)) {
            ToolOutcome::Completed { status, stdout, .. } => {
                assert!(status.success());
                assert_eq!(stdout.trim(), "hello");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn kills_slow_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let outcome = run_with_timeout(&mut cmd, Duration::from_millis(200));
        assert!(matches!(outcome, ToolOutcome::TimedOut));
    }

    #[test]
    fn reaped_child_has_exit_status() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        reap(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn missing_binary_is_failure() {
        let mut cmd = Command::new("definitely-not-a-real-tool-odcscan");
        let outcome = run_with_timeout(&mut cmd, Duration::from_secs(1));
        assert!(matches!(outcome, ToolOutcome::Failed(_)));
    }
}
