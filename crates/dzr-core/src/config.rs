//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Desktop browser UA the service expects on gateway calls
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Endpoints, headers and timeouts for one client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Primary media endpoint
    pub media_url: Url,
    /// Gateway endpoint for catalog and session calls
    pub gateway_url: Url,
    /// User agent for all service requests
    pub user_agent: String,
    /// Language tag sent as `Accept-Language`
    pub language: String,
    /// Timeout for JSON requests in milliseconds
    pub request_timeout_ms: u64,
    /// Streaming settings
    pub stream: StreamConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            media_url: Url::parse("https://media.deezer.com/v1/get_url").expect("valid default media URL"),
            gateway_url: Url::parse("https://www.deezer.com/ajax/gw-light.php").expect("valid default gateway URL"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            language: "en-US".to_string(),
            request_timeout_ms: 10_000,
            stream: StreamConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load a JSON config file; absent fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        for url in [&self.media_url, &self.gateway_url] {
            if !is_allowed_endpoint(url) {
                return Err(Error::InvalidConfig(format!("endpoint must use https: {}", url)));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be positive".into()));
        }
        self.stream.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings for the streaming decryptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Connect timeout for media downloads in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout for media downloads in milliseconds
    pub read_timeout_ms: u64,
    /// Bounded channel capacity, in frames
    pub channel_capacity: usize,
    /// Total attempts for one stream, including the first
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 60_000,
            read_timeout_ms: 60_000,
            channel_capacity: 32,
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig("channel_capacity must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts must be positive".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn is_allowed_endpoint(url: &Url) -> bool {
    match url.scheme() {
        "https" => true,
        "http" => matches!(url.host_str(), Some("127.0.0.1") | Some("localhost")),
        _ => false,
    }
}
