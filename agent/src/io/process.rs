//! Child process execution with a wall-clock timeout and bounded capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of a child that ran to completion.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_dropped: usize,
    pub stderr_dropped: usize,
    /// A background process still held stdout or stderr when the run ended.
    pub streams_left_open: bool,
}

/// How a bounded child run ended.
#[derive(Debug)]
pub enum ProcessOutcome {
    Exited(ProcessOutput),
    TimedOut,
}

impl ProcessOutput {
    /// Render the run the way tool results present it to the model.
    ///
    /// Empty streams are omitted; a zero exit with no output yields a fixed
    /// marker so the model never sees an empty result.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        if let Some(section) = render_stream("STDOUT", &self.stdout, self.stdout_dropped) {
            sections.push(section);
        }
        if let Some(section) = render_stream("STDERR", &self.stderr, self.stderr_dropped) {
            sections.push(section);
        }
        if self.streams_left_open {
            sections.push("[output streams left open by a background process]".to_string());
        }
        if !self.status.success() {
            sections.push(match self.status.code() {
                Some(code) => format!("Process exited with code {code}"),
                None => "Process terminated by signal".to_string(),
            });
        }
        if sections.is_empty() {
            return "No output produced.".to_string();
        }
        sections.join("\n\n")
    }
}

fn render_stream(label: &str, bytes: &[u8], dropped: usize) -> Option<String> {
    if bytes.is_empty() && dropped == 0 {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut section = format!("{label}:\n{}", text.trim_end());
    if dropped > 0 {
        section.push_str(&format!(
            "\n[{} truncated {dropped} bytes]",
            label.to_lowercase()
        ));
    }
    Some(section)
}

/// Run `cmd` with stdin closed, killing it if it outlives `timeout`.
///
/// Both pipes are drained on reader threads so a chatty child cannot deadlock
/// on a full pipe. At most `output_limit_bytes` per stream are kept.
///
/// The whole run, including draining output, is bounded by `timeout`. On
/// timeout the child is killed and reaped. If the child exits but a background
/// process it started keeps the pipes open, the output read so far is returned
/// and the readers are left to finish on their own.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ProcessOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = cmd.spawn().context("spawn child process")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout_capture = SharedCapture::default();
    let stderr_capture = SharedCapture::default();
    spawn_reader(stdout, output_limit_bytes, &stdout_capture, done_tx.clone());
    spawn_reader(stderr, output_limit_bytes, &stderr_capture, done_tx);

    let status = match child.wait_timeout(timeout).context("wait for child")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "child timed out, killing");
            child.kill().context("kill child")?;
            child.wait().context("reap child after kill")?;
            return Ok(ProcessOutcome::TimedOut);
        }
    };

    let deadline = started + timeout;
    let mut open_streams = 2;
    while open_streams > 0 {
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(DRAIN_GRACE);
        match done_rx.recv_timeout(remaining) {
            Ok(result) => {
                result.context("collect child output")?;
                open_streams -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(open_streams, "child exited but its output is still held open");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => bail!("output reader thread panicked"),
        }
    }

    let (stdout, stdout_dropped) = take_capture(&stdout_capture)?;
    let (stderr, stderr_dropped) = take_capture(&stderr_capture)?;
    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "child output truncated");
    }

    debug!(exit_code = ?status.code(), "child finished");
    Ok(ProcessOutcome::Exited(ProcessOutput {
        status,
        stdout,
        stderr,
        stdout_dropped,
        stderr_dropped,
        streams_left_open: open_streams > 0,
    }))
}

/// Minimum wait for readers after the child exits, even at the deadline.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Bytes kept from one stream plus the count of bytes dropped past the limit.
#[derive(Debug, Default)]
struct Capture {
    kept: Vec<u8>,
    dropped: usize,
}

type SharedCapture = Arc<Mutex<Capture>>;

fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    capture: &SharedCapture,
    done: Sender<Result<()>>,
) {
    let capture = Arc::clone(capture);
    thread::spawn(move || {
        let result = read_bounded(reader, limit, &capture);
        // The receiver is gone once the run has returned.
        let _ = done.send(result);
    });
}

fn take_capture(capture: &SharedCapture) -> Result<(Vec<u8>, usize)> {
    let mut guard = capture
        .lock()
        .map_err(|_| anyhow!("output capture lock poisoned"))?;
    let taken = std::mem::take(&mut *guard);
    Ok((taken.kept, taken.dropped))
}

/// Read `reader` to EOF into `capture`, keeping at most `limit` bytes.
fn read_bounded<R: Read>(mut reader: R, limit: usize, capture: &Mutex<Capture>) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read child output")?;
        if n == 0 {
            return Ok(());
        }
        let mut guard = capture
            .lock()
            .map_err(|_| anyhow!("output capture lock poisoned"))?;
        let room = limit.saturating_sub(guard.kept.len());
        let keep = n.min(room);
        guard.kept.extend_from_slice(&chunk[..keep]);
        guard.dropped += n - keep;
    }
}
