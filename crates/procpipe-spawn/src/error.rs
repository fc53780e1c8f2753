// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for spawn configuration and execution.

use std::fmt;
use thiserror::Error;

/// Names the child stream an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Errors from spawn configuration, process creation, and output delivery.
///
/// [`InvalidArgument`](SpawnError::InvalidArgument) and
/// [`Start`](SpawnError::Start) are synchronous — they are returned before
/// any output channel exists. The remaining variants are delivered through
/// the output stream, after every line produced before the failure.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Invalid spawn configuration, rejected before any process starts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The OS failed to create the process.
    #[error("failed to start `{program}`: {source}")]
    Start {
        /// Executable path or command name that failed to launch.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("`{program}` (pid {pid}) exited with code {code:?}")]
    NonZeroExit {
        /// Executable path or command name.
        program: String,
        /// OS process id of the failed invocation.
        pid: u32,
        /// Exit code, or `None` when the OS reports none (signal-terminated).
        code: Option<i32>,
    },

    /// Reading one of the child's output pipes failed mid-stream.
    #[error("failed to read child {stream}: {source}")]
    Read {
        /// Which pipe failed.
        stream: StreamKind,
        /// Underlying read error.
        #[source]
        source: std::io::Error,
    },

    /// The OS could not report the child's exit status.
    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        /// Executable path or command name.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}
