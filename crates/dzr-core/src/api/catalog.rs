//! Track metadata lookup

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::gateway::{value_string, GatewayClient};
use crate::error::{Error, Result};
use crate::session::Credentials;
use crate::types::TrackMetadata;

/// Source of per-track metadata
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch metadata for a track. Never cached.
    async fn track_metadata(&self, credentials: &Credentials, track_id: &str) -> Result<TrackMetadata>;
}

/// Catalog backed by the gateway's `song.getListData`
#[derive(Clone)]
pub struct GatewayCatalog {
    gateway: GatewayClient,
}

impl GatewayCatalog {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Catalog for GatewayCatalog {
    #[instrument(skip(self, credentials))]
    async fn track_metadata(&self, credentials: &Credentials, track_id: &str) -> Result<TrackMetadata> {
        let results = self
            .gateway
            .call(credentials, "song.getListData", json!({ "sng_ids": [track_id] }))
            .await?;

        let entry = results["data"]
            .as_array()
            .and_then(|data| data.first())
            .ok_or_else(|| Error::resolution(track_id, "track not found in catalog"))?;

        let metadata = parse_track_metadata(track_id, entry);
        debug!(
            track_id,
            media_version = %metadata.media_version,
            fallback = ?metadata.fallback_id,
            "Track metadata fetched"
        );
        Ok(metadata)
    }
}

/// Map one `song.getListData` entry
pub(crate) fn parse_track_metadata(track_id: &str, entry: &Value) -> TrackMetadata {
    let fallback_id = value_string(&entry["FALLBACK"]["SNG_ID"]).filter(|id| !id.is_empty() && id != "0");
    let file_size_misc = value_string(&entry["FILESIZE_MP3_MISC"]).and_then(|size| size.parse::<u64>().ok());

    TrackMetadata {
        track_id: value_string(&entry["SNG_ID"]).unwrap_or_else(|| track_id.to_string()),
        md5_origin: value_string(&entry["MD5_ORIGIN"]).unwrap_or_default(),
        media_version: value_string(&entry["MEDIA_VERSION"]).unwrap_or_default(),
        fallback_id,
        file_size_misc,
    }
}
