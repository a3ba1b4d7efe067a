//! Consumer side of a decrypted stream

use bytes::Bytes;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};

/// Messages from the producer task
#[derive(Debug)]
pub(crate) enum StreamEvent {
    /// A new attempt starts again from byte zero
    Restart { attempt: u32 },
    /// Decrypted bytes of an attempt, in order
    Data { attempt: u32, bytes: Bytes },
    /// The stream completed
    Done,
    /// The stream failed for good
    Failed(Error),
}

/// Decrypted byte stream handed to the playback consumer.
///
/// Bytes come out in original file order. When the producer restarts after a
/// stream reset, the replayed prefix of the new attempt is skipped, so the
/// consumer never sees a byte twice. Dropping the handle stops the producer.
pub struct StreamHandle {
    rx: mpsc::Receiver<StreamEvent>,
    task: JoinHandle<()>,
    total_len: Option<u64>,
    /// Bytes handed to the consumer
    delivered: u64,
    /// Attempt currently being read
    attempt: u32,
    /// Bytes of the current attempt seen so far, delivered or skipped
    attempt_offset: u64,
    /// Remainder of a chunk partly consumed through `AsyncRead`
    pending: Bytes,
    finished: bool,
    /// Kind of the terminal error, repeated on every later read
    failed: Option<io::ErrorKind>,
}

impl StreamHandle {
    pub(crate) fn new(rx: mpsc::Receiver<StreamEvent>, task: JoinHandle<()>, total_len: Option<u64>) -> Self {
        Self {
            rx,
            task,
            total_len,
            delivered: 0,
            attempt: 1,
            attempt_offset: 0,
            pending: Bytes::new(),
            finished: false,
            failed: None,
        }
    }

    /// Declared total length, when known
    pub fn total_len(&self) -> Option<u64> {
        self.total_len
    }

    /// Bytes delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Attempt the handle is currently reading from, starting at 1
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Next chunk of decrypted bytes, `None` at end of stream
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.pending.is_empty() {
            return Ok(Some(std::mem::take(&mut self.pending)));
        }
        std::future::poll_fn(|cx| self.poll_chunk(cx)).await
    }

    /// Stop the producer and release the network call
    pub fn cancel(&mut self) {
        if !self.finished {
            debug!(delivered = self.delivered, "Stream cancelled");
        }
        self.task.abort();
        self.rx.close();
        self.pending = Bytes::new();
        self.finished = true;
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>>> {
        loop {
            if let Some(kind) = self.failed {
                return Poll::Ready(Err(Error::Io(io::Error::new(kind, "stream already failed"))));
            }
            if self.finished {
                return Poll::Ready(Ok(None));
            }

            let Some(event) = ready!(self.rx.poll_recv(cx)) else {
                return Poll::Ready(Err(self.fail(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream producer stopped before completion",
                )))));
            };

            match event {
                StreamEvent::Restart { attempt } => {
                    debug!(attempt, delivered = self.delivered, "Stream restarted");
                    self.attempt = attempt;
                    self.attempt_offset = 0;
                }
                StreamEvent::Data { attempt, bytes } => {
                    if attempt != self.attempt {
                        continue;
                    }
                    if let Some(fresh) = self.accept(bytes) {
                        return Poll::Ready(Ok(Some(fresh)));
                    }
                }
                StreamEvent::Done => {
                    self.finished = true;
                    return Poll::Ready(Ok(None));
                }
                StreamEvent::Failed(err) => return Poll::Ready(Err(self.fail(err))),
            }
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        self.finished = true;
        self.failed = Some(err.io_kind());
        err
    }

    /// Keep only the part of a chunk past what was already delivered
    fn accept(&mut self, bytes: Bytes) -> Option<Bytes> {
        let start = self.attempt_offset;
        let end = start + bytes.len() as u64;
        self.attempt_offset = end;

        if end <= self.delivered {
            return None;
        }

        let skip = self.delivered.saturating_sub(start) as usize;
        self.delivered = end;
        Some(bytes.slice(skip..))
    }
}

impl AsyncRead for StreamHandle {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pending.is_empty() {
            match ready!(this.poll_chunk(cx)) {
                Ok(Some(bytes)) => this.pending = bytes,
                Ok(None) => return Poll::Ready(Ok(())),
                Err(err) => return Poll::Ready(Err(err.into_io())),
            }
        }

        let n = buf.remaining().min(this.pending.len());
        buf.put_slice(&this.pending.split_to(n));
        Poll::Ready(Ok(()))
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
