//! Media resolver
//!
//! Turns a [`TrackStreamRequest`] into one playable URL plus the key needed to
//! decrypt it. Policy, in order:
//!
//! 1. Insufficient rights: synthesize a legacy URL from the track's own
//!    metadata and probe it; a 403 switches once to the fallback track's
//!    metadata.
//! 2. No sources: synthesize from the fallback track's metadata.
//! 3. Otherwise: the first source, verbatim.
//!
//! Nothing is cached; every call goes to the network.

use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::{build_client, Catalog, GatewayCatalog, GatewayClient, HttpMediaService, MediaService};
use crate::config::ClientConfig;
use crate::crypto::CipherContext;
use crate::error::{Error, Result};
use crate::legacy::{self, FALLBACK_QUALITY};
use crate::session::{ArlSession, Credentials, SessionProvider};
use crate::types::{ResolutionPath, ResolvedMedia, TrackMetadata, TrackStreamRequest};

/// Calls allowed per operation: the first, plus one after a refresh
const SESSION_ATTEMPTS: u32 = 2;

/// Resolves tracks against injected session, catalog and media collaborators
#[derive(Clone)]
pub struct Resolver {
    session: Arc<dyn SessionProvider>,
    catalog: Arc<dyn Catalog>,
    media: Arc<dyn MediaService>,
}

impl Resolver {
    pub fn new(session: Arc<dyn SessionProvider>, catalog: Arc<dyn Catalog>, media: Arc<dyn MediaService>) -> Self {
        Self {
            session,
            catalog,
            media,
        }
    }

    /// Resolver over the live service for an `arl` session credential
    pub fn connect(config: &ClientConfig, arl: impl Into<String>) -> Result<Self> {
        config.validate()?;

        let client = build_client(config)?;
        let gateway = GatewayClient::with_client(client.clone(), config);

        Ok(Self::new(
            Arc::new(ArlSession::new(gateway.clone(), arl)),
            Arc::new(GatewayCatalog::new(gateway)),
            Arc::new(HttpMediaService::with_client(client, config)),
        ))
    }

    /// Resolve a track to a playable URL and its cipher context
    #[instrument(skip(self, request), fields(track_id = %request.track_id, quality = %request.quality))]
    pub async fn resolve(&self, request: &TrackStreamRequest) -> Result<ResolvedMedia> {
        let media = &self.media;
        let descriptor = self
            .with_session(|credentials| async move { media.get_media(&credentials, request).await })
            .await?;

        if descriptor.insufficient_rights {
            info!("Insufficient rights on requested media, synthesizing legacy URL");
            return self.resolve_restricted(&request.track_id).await;
        }

        match descriptor.first_source() {
            Some(source) => {
                info!(format = %source.format, host = ?source.url.host_str(), "Using direct source");
                Ok(ResolvedMedia {
                    track_id: request.track_id.clone(),
                    url: source.url.clone(),
                    cipher: CipherContext::for_track(&request.track_id),
                    format: Some(source.format),
                    path: ResolutionPath::Direct,
                })
            }
            None => {
                info!("No media sources returned, trying fallback track");
                let metadata = self.fetch_metadata(&request.track_id).await?;
                self.resolve_fallback(&request.track_id, &metadata).await
            }
        }
    }

    /// Insufficient-rights branch: synthesize, probe, maybe switch to the fallback
    async fn resolve_restricted(&self, track_id: &str) -> Result<ResolvedMedia> {
        let metadata = self.fetch_metadata(track_id).await?;
        let url = legacy::synthesize_url(track_id, &metadata.md5_origin, &metadata.media_version, FALLBACK_QUALITY)?;

        match self.media.probe(&url).await {
            Ok(StatusCode::FORBIDDEN) => {
                info!("Synthesized URL refused, switching to fallback track");
                let current = self.fetch_metadata(track_id).await?;
                self.resolve_fallback(track_id, &current).await
            }
            Ok(status) => {
                debug!(status = %status, "Synthesized URL probed");
                Ok(synthesized(track_id, url, ResolutionPath::Synthesized))
            }
            Err(e) => {
                debug!(error = %e, "Probe failed, keeping synthesized URL");
                Ok(synthesized(track_id, url, ResolutionPath::Synthesized))
            }
        }
    }

    /// Synthesize from the substitute track's metadata, keeping the requested id
    async fn resolve_fallback(&self, track_id: &str, metadata: &TrackMetadata) -> Result<ResolvedMedia> {
        let fallback_id = metadata
            .fallback_id
            .as_deref()
            .ok_or_else(|| Error::resolution(track_id, "no sources and no fallback track"))?;

        let fallback = self.fetch_metadata(fallback_id).await?;
        if fallback.md5_origin.is_empty() {
            return Err(Error::resolution(track_id, format!("fallback track {} has no origin hash", fallback_id)));
        }

        let url = legacy::synthesize_url(track_id, &fallback.md5_origin, &fallback.media_version, FALLBACK_QUALITY)?;
        info!(fallback_id, "Synthesized URL from fallback track");

        Ok(synthesized(
            track_id,
            url,
            ResolutionPath::SynthesizedFallback {
                fallback_id: fallback_id.to_string(),
            },
        ))
    }

    async fn fetch_metadata(&self, track_id: &str) -> Result<TrackMetadata> {
        let catalog = &self.catalog;
        self.with_session(|credentials| async move { catalog.track_metadata(&credentials, track_id).await })
            .await
    }

    /// Run a service call, refreshing the session once if it is rejected
    async fn with_session<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut(Credentials) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut credentials = self.session.credentials().await?;

        for attempt in 1..=SESSION_ATTEMPTS {
            match call(credentials.clone()).await {
                Err(Error::InvalidSession) => {
                    if attempt < SESSION_ATTEMPTS {
                        warn!("Session token rejected, refreshing");
                        credentials = self.session.refresh().await?;
                    }
                }
                other => return other,
            }
        }

        Err(Error::Auth("session token still rejected after refresh".into()))
    }
}

fn synthesized(track_id: &str, url: Url, path: ResolutionPath) -> ResolvedMedia {
    ResolvedMedia {
        track_id: track_id.to_string(),
        url,
        cipher: CipherContext::for_track(track_id),
        format: None,
        path,
    }
}
