//! Bounded subprocess execution for scanner and verifier commands.
//!
//! Every external call in the pipeline is blocking with an explicit
//! timeout. Classification follows the retry policy: a missing tool is
//! fatal, a timeout or signal kill is transient.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use remedian_core::ScanError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a bounded run. A non-zero exit is not an error at
/// this layer; callers interpret the status.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// The process exited via signal rather than a normal code.
    pub fn killed_by_signal(&self) -> bool {
        self.status.code().is_none()
    }
}

/// Run a command to completion or kill it at the deadline.
pub fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> Result<ProcessOutput, ScanError> {
    let program = command.get_program().to_string_lossy().to_string();
    command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    tracing::debug!(program = program.as_str(), timeout_secs = timeout.as_secs(), "bounded run");
    let mut child = command.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ScanError::Fatal(format!("`{program}` not found on PATH"))
        } else {
            ScanError::Fatal(format!("failed to spawn `{program}`: {err}"))
        }
    })?;

    let stdout_handle = drain_pipe(child.stdout.take());
    let stderr_handle = drain_pipe(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    kill_and_reap(&mut child);
                    join_pipe(stdout_handle);
                    join_pipe(stderr_handle);
                    return Err(ScanError::Transient(format!(
                        "`{program}` timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                std::thread::sleep(POLL_INTERVAL);
            },
            Err(err) => {
                kill_and_reap(&mut child);
                join_pipe(stdout_handle);
                join_pipe(stderr_handle);
                return Err(ScanError::Fatal(format!(
                    "failed to wait for `{program}`: {err}"
                )));
            },
        }
    };

    let output = ProcessOutput {
        status,
        stdout: join_pipe(stdout_handle),
        stderr: join_pipe(stderr_handle),
    };
    if output.killed_by_signal() {
        return Err(ScanError::Transient(format!(
            "`{program}` was terminated by a signal"
        )));
    }
    Ok(output)
}

fn drain_pipe<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<std::thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn join_pipe(handle: Option<std::thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
