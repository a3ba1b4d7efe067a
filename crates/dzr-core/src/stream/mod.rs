//! Streaming decryptor
//!
//! ```text
//!   MediaFetcher ──chunks──▶ StripeDecoder ──frames──▶ mpsc (bounded) ──▶ StreamHandle
//!        ▲                    (per attempt)                                  │
//!        └──────── restart from byte 0 on stream reset ◀─────────────────────┘
//! ```
//!
//! One producer task per stream reads the body, decrypts every third frame
//! and pushes frames through a bounded channel. The consumer reads the handle
//! at its own pace; a full channel parks the producer.

pub mod handle;
pub mod source;
pub mod stripe;

pub use handle::StreamHandle;
pub use source::{ChunkSource, HttpFetcher, MediaFetcher};
pub use stripe::{decode_all, StripeDecoder};

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ClientConfig, StreamConfig};
use crate::crypto::CipherContext;
use crate::error::{Error, Result};
use crate::types::ResolvedMedia;
use handle::StreamEvent;

/// Opens decrypted streams
#[derive(Clone)]
pub struct StreamDecryptor {
    fetcher: Arc<dyn MediaFetcher>,
    config: StreamConfig,
}

impl StreamDecryptor {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, config: StreamConfig) -> Self {
        Self { fetcher, config }
    }

    /// Decryptor over HTTP with the configured timeouts
    pub fn http(config: &ClientConfig) -> Result<Self> {
        config.stream.validate()?;
        Ok(Self::new(Arc::new(HttpFetcher::new(config)?), config.stream.clone()))
    }

    /// Open a stream for a resolved track
    pub async fn open_resolved(&self, media: &ResolvedMedia, expected_len: Option<u64>) -> Result<StreamHandle> {
        self.open(&media.url, media.cipher, expected_len).await
    }

    /// Start streaming `url`, decrypting with `cipher`.
    ///
    /// `expected_len` is the declared size of the stream; without it the
    /// server's `Content-Length` is used when available.
    #[instrument(skip(self, cipher), fields(url = %url))]
    pub async fn open(&self, url: &Url, cipher: CipherContext, expected_len: Option<u64>) -> Result<StreamHandle> {
        self.config.validate()?;

        let total_len = match expected_len {
            Some(len) => Some(len),
            None => self.fetcher.content_length(url).await.unwrap_or_else(|e| {
                debug!(error = %e, "Content length unavailable");
                None
            }),
        };

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let producer = Producer {
            fetcher: Arc::clone(&self.fetcher),
            url: url.clone(),
            cipher,
            total_len,
            config: self.config.clone(),
            tx,
        };
        let task = tokio::spawn(producer.run());

        info!(total_len = ?total_len, "Stream opened");
        Ok(StreamHandle::new(rx, task, total_len))
    }
}

// =============================================================================
// Producer
// =============================================================================

/// How one attempt ended without an error
enum AttemptEnd {
    Complete,
    /// The consumer went away
    Closed,
}

struct Producer {
    fetcher: Arc<dyn MediaFetcher>,
    url: Url,
    cipher: CipherContext,
    total_len: Option<u64>,
    config: StreamConfig,
    tx: mpsc::Sender<StreamEvent>,
}

impl Producer {
    async fn run(self) {
        let mut attempt = 1;
        loop {
            if attempt > 1 && self.tx.send(StreamEvent::Restart { attempt }).await.is_err() {
                return;
            }

            let err = match self.attempt(attempt).await {
                Ok(AttemptEnd::Complete) => {
                    debug!(attempt, "Stream complete");
                    let _ = self.tx.send(StreamEvent::Done).await;
                    return;
                }
                Ok(AttemptEnd::Closed) => return,
                Err(err) => err,
            };

            if err.is_recoverable() && attempt < self.config.max_attempts {
                warn!(
                    attempt,
                    max_attempts = self.config.max_attempts,
                    error = %err,
                    "Stream reset, restarting from the beginning"
                );
                tokio::time::sleep(self.config.retry_delay()).await;
                attempt += 1;
                continue;
            }

            let err = match err {
                Error::TransientStream { reason, .. } => Error::TransientStream {
                    attempts: attempt,
                    reason,
                },
                other => other,
            };
            warn!(attempt, code = err.error_code(), error = %err, "Stream failed");
            let _ = self.tx.send(StreamEvent::Failed(err)).await;
            return;
        }
    }

    async fn attempt(&self, attempt: u32) -> Result<AttemptEnd> {
        let mut source = self.fetcher.open(&self.url).await?;
        let mut decoder = StripeDecoder::new(self.cipher);
        let mut emitted = 0u64;

        while let Some(chunk) = source.next_chunk().await? {
            for frame in decoder.push(&chunk)? {
                if !self.emit(attempt, frame, &mut emitted).await? {
                    return Ok(AttemptEnd::Closed);
                }
            }
        }
        if let Some(frame) = decoder.finish()? {
            if !self.emit(attempt, frame, &mut emitted).await? {
                return Ok(AttemptEnd::Closed);
            }
        }

        match self.total_len {
            Some(total) if emitted < total => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream ended after {} of {} bytes", emitted, total),
            ))),
            _ => Ok(AttemptEnd::Complete),
        }
    }

    /// Send one frame; `false` when the consumer is gone
    async fn emit(&self, attempt: u32, bytes: bytes::Bytes, emitted: &mut u64) -> Result<bool> {
        *emitted += bytes.len() as u64;
        if let Some(total) = self.total_len {
            if *emitted > total {
                return Err(Error::Integrity(format!(
                    "stream exceeds declared length of {} bytes",
                    total
                )));
            }
        }
        Ok(self.tx.send(StreamEvent::Data { attempt, bytes }).await.is_ok())
    }
}
