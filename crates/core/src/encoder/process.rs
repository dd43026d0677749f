//! Process execution for encoder invocations.
//!
//! A [`ProcessHandle`] owns one spawned encoder process. Both of its output
//! pipes are drained by background tasks from the moment it is spawned, so a
//! caller that only cares about stderr can never stall the process on a full
//! stdout pipe.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::error::EncoderError;
use super::lines::LineReader;

/// Lifecycle of a spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exit code is `None` when the process was killed by a signal.
    Terminated(Option<i32>),
}

/// Which output pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Lines read from one output pipe of a process.
#[derive(Debug)]
pub struct LineStream {
    channel: Channel,
    rx: mpsc::UnboundedReceiver<std::io::Result<String>>,
    closed: Arc<AtomicBool>,
}

impl LineStream {
    /// Returns the next line, or `None` once the pipe is exhausted or the
    /// owning process has been destroyed.
    pub async fn next_line(&mut self) -> Result<Option<String>, EncoderError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(EncoderError::Io(e)),
            None => Ok(None),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
}

/// One spawned encoder process and its output streams.
pub struct ProcessHandle {
    program: PathBuf,
    child: Child,
    pid: Option<u32>,
    stdout: Option<LineStream>,
    stderr: Option<LineStream>,
    readers: Vec<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
    state: ProcessState,
}

impl ProcessHandle {
    /// Starts `program` with `args`, stdin closed and both outputs piped.
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self, EncoderError> {
        debug!(program = %program.display(), ?args, "Spawning encoder");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncoderError::LaunchFailure {
                path: program.to_path_buf(),
                source,
            })?;

        let pid = child.id();
        let closed = Arc::new(AtomicBool::new(false));
        let mut readers = Vec::with_capacity(2);

        let stdout = child.stdout.take().map(|pipe| {
            let (stream, reader) = Self::drain(pipe, Channel::Stdout, &closed);
            readers.push(reader);
            stream
        });
        let stderr = child.stderr.take().map(|pipe| {
            let (stream, reader) = Self::drain(pipe, Channel::Stderr, &closed);
            readers.push(reader);
            stream
        });

        Ok(Self {
            program: program.to_path_buf(),
            child,
            pid,
            stdout,
            stderr,
            readers,
            closed,
            state: ProcessState::Running,
        })
    }

    /// Spawns a task that forwards every line of `pipe` into a channel.
    ///
    /// The task keeps reading after the receiver is dropped so the pipe never
    /// fills up; from then on lines are thrown away.
    fn drain<R>(pipe: R, channel: Channel, closed: &Arc<AtomicBool>) -> (LineStream, JoinHandle<()>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut lines = LineReader::new(BufReader::new(pipe));
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        trace!(channel = channel.as_str(), "{}", line);
                        if !tx.is_closed() {
                            let _ = tx.send(Ok(line));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });

        let stream = LineStream {
            channel,
            rx,
            closed: Arc::clone(closed),
        };
        (stream, reader)
    }

    /// OS process id, if the process was still running when spawned.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Takes the stdout line stream. Returns `None` if already taken.
    pub fn take_stdout(&mut self) -> Option<LineStream> {
        self.stdout.take()
    }

    /// Drops the stdout line stream. Its reader keeps draining the pipe but
    /// discards every line.
    pub fn discard_stdout(&mut self) {
        self.stdout = None;
    }

    /// Takes the stderr line stream. Returns `None` if already taken.
    pub fn take_stderr(&mut self) -> Option<LineStream> {
        self.stderr.take()
    }

    /// Waits for the process to exit and both readers to reach end of stream.
    pub async fn wait(&mut self) -> Result<Option<i32>, EncoderError> {
        if let ProcessState::Terminated(code) = self.state {
            return Ok(code);
        }

        let status = self.child.wait().await?;
        // A reader stays in the list until joined so `destroy` can still abort
        // it if this future is dropped.
        while let Some(reader) = self.readers.first_mut() {
            if let Err(e) = reader.await {
                warn!(pid = ?self.pid, "Output reader task failed: {}", e);
            }
            self.readers.remove(0);
        }

        let code = status.code();
        self.state = ProcessState::Terminated(code);
        debug!(pid = ?self.pid, exit_code = ?code, "Encoder exited");
        Ok(code)
    }

    /// Terminates the process if it is still running and releases its streams.
    ///
    /// Safe to call any number of times, including after [`wait`](Self::wait).
    /// Failures are logged; by the time this runs the outcome is decided.
    pub async fn destroy(&mut self) {
        self.closed.store(true, Ordering::Release);
        for reader in self.readers.drain(..) {
            reader.abort();
        }

        if let ProcessState::Terminated(_) = self.state {
            return;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.state = ProcessState::Terminated(status.code());
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(pid = ?self.pid, "Failed to poll encoder: {}", e),
        }

        if let Err(e) = self.child.start_kill() {
            warn!(pid = ?self.pid, "Failed to kill encoder: {}", e);
        } else {
            crate::metrics::PROCESSES_KILLED.inc();
            debug!(pid = ?self.pid, "Killed encoder");
        }

        let code = match self.child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(pid = ?self.pid, "Failed to reap encoder: {}", e);
                None
            }
        };
        self.state = ProcessState::Terminated(code);
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // kill_on_drop takes care of the child itself
        for reader in &self.readers {
            reader.abort();
        }
    }
}
