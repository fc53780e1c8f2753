// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consumer side of a spawned invocation: one ordered line stream.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

use crate::SpawnError;

/// Ordered sequence of mapped output elements from one spawned invocation.
///
/// Yields `Ok` elements for mapped lines and at most one terminal `Err`
/// for an unsuccessful invocation. Every line produced before the failure
/// is delivered before the error; after the error the stream is fused and
/// yields nothing further.
pub struct LineStream<T> {
    rx: mpsc::Receiver<Result<T, SpawnError>>,
    pid: u32,
    done: bool,
}

impl<T> LineStream<T> {
    pub(crate) fn new(rx: mpsc::Receiver<Result<T, SpawnError>>, pid: u32) -> Self {
        Self {
            rx,
            pid,
            done: false,
        }
    }

    /// OS process id of the invocation feeding this stream.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Pull the next element; `None` once the invocation has completed.
    pub async fn recv(&mut self) -> Option<Result<T, SpawnError>> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(Err(err)) => {
                self.fuse();
                Some(Err(err))
            }
            other => other,
        }
    }

    /// Drain the stream, collecting mapped elements until normal
    /// completion or the terminal error.
    pub async fn collect_ok(mut self) -> Result<Vec<T>, SpawnError> {
        let mut out = Vec::new();
        while let Some(item) = self.recv().await {
            out.push(item?);
        }
        Ok(out)
    }

    fn fuse(&mut self) {
        self.done = true;
        self.rx.close();
    }
}

impl<T> Stream for LineStream<T> {
    type Item = Result<T, SpawnError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Err(err))) => {
                self.fuse();
                Poll::Ready(Some(Err(err)))
            }
            other => other,
        }
    }
}

impl<T> fmt::Debug for LineStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineStream")
            .field("pid", &self.pid)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
