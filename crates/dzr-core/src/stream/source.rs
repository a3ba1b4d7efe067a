//! Byte sources for the decryptor

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response};
use std::error::Error as StdError;
use std::io::ErrorKind;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// One open response body, read chunk by chunk
#[async_trait]
pub trait ChunkSource: Send {
    /// Next body chunk, `None` at end of body
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Opens media URLs for streaming
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Declared size of the resource, when the server reports one
    async fn content_length(&self, url: &Url) -> Result<Option<u64>>;

    /// Start a fresh GET of the whole resource
    async fn open(&self, url: &Url) -> Result<Box<dyn ChunkSource>>;
}

/// Fetcher over reqwest with the long media timeouts
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.stream.connect_timeout())
            .read_timeout(config.stream.read_timeout())
            .http1_only()
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn content_length(&self, url: &Url) -> Result<Option<u64>> {
        let response = self.client.head(url.clone()).send().await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "HEAD request refused");
            return Ok(None);
        }

        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|len| *len > 0);
        Ok(length)
    }

    async fn open(&self, url: &Url) -> Result<Box<dyn ChunkSource>> {
        let response = self.client.get(url.clone()).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Io(std::io::Error::other(format!(
                "media request returned {}",
                status
            ))));
        }

        Ok(Box::new(HttpChunkSource { response }))
    }
}

struct HttpChunkSource {
    response: Response,
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.response.chunk().await.map_err(classify)
    }
}

/// Map a transport error, singling out stream resets
fn classify(err: reqwest::Error) -> Error {
    if is_stream_reset(&err) {
        Error::stream_reset(err.to_string())
    } else {
        Error::Network(err)
    }
}

/// Walk the source chain looking for an HTTP/2 reset or a dropped connection
pub(crate) fn is_stream_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }

        let message = e.to_string();
        if message.contains("RST_STREAM") || message.contains("stream error received") {
            return true;
        }

        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "error decoding response body")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_reset_found_in_source_chain() {
        let err = Wrapped(std::io::Error::new(ErrorKind::ConnectionReset, "peer reset"));
        assert!(is_stream_reset(&err));
    }

    #[test]
    fn test_h2_reset_message_detected() {
        let err = std::io::Error::other("stream error received: unexpected internal error encountered");
        assert!(is_stream_reset(&err));
    }

    #[test]
    fn test_timeout_is_not_reset() {
        let err = Wrapped(std::io::Error::new(ErrorKind::TimedOut, "read timed out"));
        assert!(!is_stream_reset(&err));
    }
}
