//! Media endpoint (`/v1/get_url`) client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{build_client, is_invalid_session, INSUFFICIENT_RIGHTS_MARKER};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::Credentials;
use crate::types::{Cipher, CipherFormat, Format, MediaDescriptor, MediaSource, TrackStreamRequest};

/// Source of playable media descriptors
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Ask the media endpoint for sources of one track
    async fn get_media(&self, credentials: &Credentials, request: &TrackStreamRequest) -> Result<MediaDescriptor>;

    /// Lightweight access check against a candidate URL
    async fn probe(&self, url: &Url) -> Result<StatusCode>;
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Serialize)]
struct MediaRequest<'a> {
    license_token: &'a str,
    media: Vec<MediaSpec>,
    track_tokens: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct MediaSpec {
    #[serde(rename = "type")]
    typ: &'static str,
    formats: Vec<CipherFormat>,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    #[serde(default)]
    data: Vec<MediaData>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(default)]
    media: Vec<Medium>,
    #[serde(default)]
    errors: Vec<MediaError>,
}

#[derive(Debug, Deserialize)]
struct Medium {
    format: Option<Format>,
    cipher: Option<MediumCipher>,
    #[serde(default)]
    sources: Vec<Source>,
}

#[derive(Debug, Deserialize)]
struct MediumCipher {
    #[serde(rename = "type")]
    typ: Cipher,
}

#[derive(Debug, Deserialize)]
struct Source {
    url: String,
    provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaError {
    code: Option<i64>,
    message: Option<String>,
}

fn request_body<'a>(credentials: &'a Credentials, request: &'a TrackStreamRequest) -> MediaRequest<'a> {
    MediaRequest {
        license_token: &credentials.license_token,
        media: vec![MediaSpec {
            typ: "FULL",
            formats: request.cipher_formats(),
        }],
        track_tokens: vec![&request.track_token],
    }
}

/// Turn a raw media response into a descriptor
pub(crate) fn parse_descriptor(body: &str) -> Result<MediaDescriptor> {
    let response: MediaResponse = serde_json::from_str(body)?;
    let mut descriptor = MediaDescriptor {
        insufficient_rights: body.contains(INSUFFICIENT_RIGHTS_MARKER),
        ..Default::default()
    };

    // The official client only ever looks at the first track entry.
    let Some(data) = response.data.into_iter().next() else {
        return Ok(descriptor);
    };

    for error in &data.errors {
        debug!(code = ?error.code, message = ?error.message, "Media endpoint error");
        if error
            .message
            .as_deref()
            .is_some_and(|m| m.contains(INSUFFICIENT_RIGHTS_MARKER))
        {
            descriptor.insufficient_rights = true;
        }
    }

    for medium in data.media {
        let format = medium.format.unwrap_or(Format::Unknown);
        let cipher = medium.cipher.map(|c| c.typ).unwrap_or(Cipher::None);

        for source in medium.sources {
            match Url::parse(&source.url) {
                Ok(url) => descriptor.sources.push(MediaSource {
                    url,
                    format,
                    cipher,
                    provider: source.provider,
                }),
                Err(e) => warn!(url = %source.url, error = %e, "Skipping unparsable media source"),
            }
        }
    }

    Ok(descriptor)
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// Media service over HTTPS
#[derive(Clone)]
pub struct HttpMediaService {
    client: Client,
    endpoint: Url,
    language: String,
}

impl HttpMediaService {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            endpoint: config.media_url.clone(),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl MediaService for HttpMediaService {
    #[instrument(skip(self, credentials, request), fields(track_id = %request.track_id))]
    async fn get_media(&self, credentials: &Credentials, request: &TrackStreamRequest) -> Result<MediaDescriptor> {
        let body = request_body(credentials, request);
        let language = self.language.split('-').next().unwrap_or("en");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT_LANGUAGE, language)
            .header(reqwest::header::COOKIE, credentials.cookie_header())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if is_invalid_session(&text) {
            return Err(Error::InvalidSession);
        }
        if status.is_server_error() {
            return Err(Error::Api(format!("media endpoint returned {}", status)));
        }

        let descriptor = parse_descriptor(&text)?;
        debug!(
            sources = descriptor.sources.len(),
            insufficient_rights = descriptor.insufficient_rights,
            "Media descriptor received"
        );
        Ok(descriptor)
    }

    #[instrument(skip(self))]
    async fn probe(&self, url: &Url) -> Result<StatusCode> {
        let response = self.client.get(url.clone()).send().await?;
        Ok(response.status())
    }
}
