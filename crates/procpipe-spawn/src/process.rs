// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process launch and the stdout/stderr → channel bridge.

use std::io;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use procpipe_cmdline::CommandLine;

use crate::{LineStream, SpawnError, SpawnOptions, StreamKind};

/// Selector applied to each completed line of one stream.
pub type LineMap<T> = Arc<dyn Fn(String) -> T + Send + Sync>;

/// One line of child output, tagged with its origin stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    /// A line the child wrote to standard output.
    Stdout(String),
    /// A line the child wrote to standard error.
    Stderr(String),
}

/// Producer-side channel capacity; full buffers backpressure the readers.
const CHANNEL_CAPACITY: usize = 256;

/// Launch `program` and bridge its output into one ordered stream.
///
/// The child starts in the working directory and with exactly the
/// environment of `options` (full replacement), with stdout and stderr
/// piped, stdin null, and no shell in between. Each completed line —
/// terminators stripped — is passed through the selector for its stream
/// and pushed onto the shared channel; a stream with no selector is
/// drained but not delivered, so the child can never block on a full
/// pipe. Per-stream order is preserved; interleaving between the two
/// streams is left to OS scheduling.
///
/// An unsuccessful exit (or a pipe read failure) is delivered as one
/// terminal [`SpawnError`] through the stream, strictly after every line
/// produced before it. Failure to start the process at all is returned
/// synchronously.
///
/// Dropping the returned stream does not terminate the child: the
/// readers keep draining it and the exit watcher still reaps the handle.
///
/// Must be called from within a tokio runtime.
pub fn spawn<T: Send + 'static>(
    program: impl Into<String>,
    cmdline: &CommandLine,
    options: &SpawnOptions,
    stdout_map: Option<LineMap<T>>,
    stderr_map: Option<LineMap<T>>,
) -> Result<LineStream<T>, SpawnError> {
    let program = program.into();

    let mut cmd = Command::new(&program);
    cmd.args(cmdline.args());
    options.apply_to(&mut cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Never pop a console window for the child.
    #[cfg(windows)]
    cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

    let mut child = cmd.spawn().map_err(|source| SpawnError::Start {
        program: program.clone(),
        source,
    })?;
    let pid = child.id().unwrap_or_default();

    debug!(target: "procpipe.spawn", program = %program, pid, "child started");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| pipe_missing(&program, StreamKind::Stdout))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| pipe_missing(&program, StreamKind::Stderr))?;

    let (tx, rx) = mpsc::channel::<Result<T, SpawnError>>(CHANNEL_CAPACITY);

    let stdout_task = spawn_line_reader(stdout, StreamKind::Stdout, stdout_map, tx.clone());
    let stderr_task = spawn_line_reader(stderr, StreamKind::Stderr, stderr_map, tx.clone());

    tokio::spawn(watch_exit(
        program,
        pid,
        child,
        stdout_task,
        stderr_task,
        tx,
    ));

    Ok(LineStream::new(rx, pid))
}

/// Convenience wrapper over [`spawn`]: deliver every line, tagged with
/// its origin stream.
pub fn spawn_tagged(
    program: impl Into<String>,
    cmdline: &CommandLine,
    options: &SpawnOptions,
) -> Result<LineStream<OutputLine>, SpawnError> {
    let stdout_map: LineMap<OutputLine> = Arc::new(OutputLine::Stdout);
    let stderr_map: LineMap<OutputLine> = Arc::new(OutputLine::Stderr);
    spawn(program, cmdline, options, Some(stdout_map), Some(stderr_map))
}

/// Read one pipe line by line, mapping and forwarding each completed
/// line. When the consumer is gone the reader keeps draining so the
/// child never blocks on a full pipe.
fn spawn_line_reader<T, R>(
    pipe: R,
    kind: StreamKind,
    map: Option<LineMap<T>>,
    tx: mpsc::Sender<Result<T, SpawnError>>,
) -> JoinHandle<Result<(), SpawnError>>
where
    T: Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        let mut delivering = true;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some(map) = map.as_ref() else { continue };
                    if delivering && tx.send(Ok(map(line))).await.is_err() {
                        delivering = false;
                    }
                }
                Ok(None) => return Ok(()),
                Err(source) => {
                    warn!(target: "procpipe.spawn", stream = %kind, error = %source, "pipe read failed");
                    return Err(SpawnError::Read {
                        stream: kind,
                        source,
                    });
                }
            }
        }
    })
}

/// Exit watcher: exclusively owns the child handle. Joins both readers
/// first, so every line they produced is in the channel before any
/// terminal signal, then reaps the child and closes or errors the
/// channel. At most one terminal signal is sent per invocation.
async fn watch_exit<T>(
    program: String,
    pid: u32,
    mut child: Child,
    stdout_task: JoinHandle<Result<(), SpawnError>>,
    stderr_task: JoinHandle<Result<(), SpawnError>>,
    tx: mpsc::Sender<Result<T, SpawnError>>,
) {
    let stdout_read = flatten_read(StreamKind::Stdout, stdout_task.await);
    let stderr_read = flatten_read(StreamKind::Stderr, stderr_task.await);

    // Readers are done (EOF or error), so the child has closed its pipes;
    // reap it on every path.
    let status = child.wait().await;

    let terminal = match (stdout_read, stderr_read) {
        (Err(err), _) | (Ok(()), Err(err)) => Some(err),
        (Ok(()), Ok(())) => match status {
            Ok(status) if status.success() => None,
            Ok(status) => Some(SpawnError::NonZeroExit {
                program: program.clone(),
                pid,
                code: status.code(),
            }),
            Err(source) => Some(SpawnError::Wait {
                program: program.clone(),
                source,
            }),
        },
    };

    match terminal {
        Some(err) => {
            debug!(target: "procpipe.spawn", program = %program, pid, error = %err, "child failed");
            let _ = tx.send(Err(err)).await;
        }
        None => {
            debug!(target: "procpipe.spawn", program = %program, pid, "child completed");
        }
    }
    // Dropping `tx` here closes the channel strictly after the terminal
    // signal, ending the consumer's iteration.
}

fn flatten_read(
    kind: StreamKind,
    joined: Result<Result<(), SpawnError>, JoinError>,
) -> Result<(), SpawnError> {
    match joined {
        Ok(result) => result,
        Err(join_err) => Err(SpawnError::Read {
            stream: kind,
            source: io::Error::other(join_err),
        }),
    }
}

fn pipe_missing(program: &str, stream: StreamKind) -> SpawnError {
    SpawnError::Start {
        program: program.to_string(),
        source: io::Error::other(format!("{stream} pipe unavailable")),
    }
}
