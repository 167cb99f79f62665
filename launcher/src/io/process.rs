//! Helpers for running child processes while keeping their output visible.
//!
//! Supervised children either inherit the launcher's terminal, run silently
//! (availability probes), or have stdout/stderr forwarded line-by-line to
//! the original streams and the headless log sink. Forwarding never buffers
//! more than one line in memory and flushes per line, so the log file stays
//! complete even when the run is cut short.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error};

use crate::logging::OutputSink;

/// Where a forwarded line should land on the parent side.
#[derive(Debug, Clone, Copy)]
enum ParentStream {
    Stdout,
    Stderr,
}

/// Run a command with no terminal interaction and no visible output.
pub fn run_quiet(mut cmd: Command) -> Result<ExitStatus> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    debug!("spawning quiet child process");
    cmd.status().context("spawn command")
}

/// Run a command with all standard streams inherited.
///
/// Used in interactive mode where children may prompt on the terminal
/// (credential prompts, the GUI process itself).
pub fn run_inherited(mut cmd: Command) -> Result<ExitStatus> {
    debug!("spawning inherited child process");
    cmd.status().context("spawn command")
}

/// Run a command, capturing stdout; stderr is discarded.
pub fn run_captured(mut cmd: Command) -> Result<(ExitStatus, String)> {
    cmd.stdin(Stdio::null()).stderr(Stdio::null());
    let output = cmd.output().context("spawn command")?;
    Ok((
        output.status,
        String::from_utf8_lossy(&output.stdout).to_string(),
    ))
}

/// Run a command, forwarding each output line to the parent streams and to
/// the duplicating sink.
///
/// Output is consumed concurrently while the child runs so pipes cannot
/// deadlock; both readers are joined before this returns.
pub fn run_forwarded(mut cmd: Command, sink: Option<&OutputSink>) -> Result<ExitStatus> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning forwarded child process");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(err = %err, "failed to spawn command");
            return Err(err).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_sink = sink.cloned();
    let stderr_sink = sink.cloned();
    let stdout_handle =
        thread::spawn(move || forward_stream(stdout, ParentStream::Stdout, stdout_sink));
    let stderr_handle =
        thread::spawn(move || forward_stream(stderr, ParentStream::Stderr, stderr_sink));

    let status = child.wait().context("wait for command")?;
    join_forwarder(stdout_handle).context("join stdout forwarder")?;
    join_forwarder(stderr_handle).context("join stderr forwarder")?;

    debug!(exit_code = ?status.code(), "command finished");
    Ok(status)
}

fn join_forwarder(handle: thread::JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output forwarder thread panicked")),
    }
}

/// Copy a child stream line-by-line to the parent stream and the sink.
fn forward_stream<R: Read>(
    reader: R,
    target: ParentStream,
    sink: Option<OutputSink>,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        let read = reader.read_until(b'\n', &mut line).context("read line")?;
        if read == 0 {
            break;
        }

        match target {
            ParentStream::Stdout => {
                let mut out = std::io::stdout();
                let _ = out.write_all(&line);
                let _ = out.flush();
            }
            ParentStream::Stderr => {
                let mut err = std::io::stderr();
                let _ = err.write_all(&line);
                let _ = err.flush();
            }
        }

        if let Some(sink) = &sink {
            sink.write_line(&line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn forwarded_output_reaches_the_sink() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log_path = temp.path().join("launcher.log");
        let sink = OutputSink::open(&log_path).expect("open sink");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out-line; echo err-line >&2");
        let status = run_forwarded(cmd, Some(&sink)).expect("run");

        assert!(status.success());
        let contents = fs::read_to_string(&log_path).expect("read log");
        assert!(contents.contains("out-line"));
        assert!(contents.contains("err-line"));
    }

    #[test]
    fn quiet_run_reports_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let status = run_quiet(cmd).expect("run");
        assert!(!status.success());
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn captured_run_returns_stdout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo captured");
        let (status, stdout) = run_captured(cmd).expect("run");
        assert!(status.success());
        assert_eq!(stdout.trim(), "captured");
    }
}
