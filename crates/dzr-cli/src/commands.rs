//! CLI command implementations

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use dzr_core::{derive_key, synthesize, ClientConfig, Resolver, StreamDecryptor, TrackStreamRequest};

use crate::output::{self, KeyView, ResolvedView};

/// Fail early when no session credential was given
pub fn require_arl(arl: Option<String>) -> anyhow::Result<String> {
    arl.filter(|arl| !arl.is_empty())
        .context("login required: pass --arl or set DZR_ARL")
}

/// Print the derived key of a track
pub fn key(track_id: &str, format: &str) -> anyhow::Result<()> {
    let view = KeyView {
        track_id: track_id.to_string(),
        key: hex::encode(derive_key(track_id)),
    };
    output::print(&view, format, |v| v.key.clone());
    Ok(())
}

/// Print the synthesized legacy URL
pub fn url(track_id: &str, md5_origin: &str, media_version: &str, quality: u8, format: &str) -> anyhow::Result<()> {
    let url = synthesize(track_id, md5_origin, media_version, quality)?;
    output::print(&serde_json::json!({ "track_id": track_id, "url": &url }), format, |_| url.clone());
    Ok(())
}

/// Resolve a track and print where it can be fetched
pub async fn resolve(config: &ClientConfig, arl: String, request: &TrackStreamRequest, format: &str) -> anyhow::Result<()> {
    let resolver = Resolver::connect(config, arl)?;
    let resolved = resolver.resolve(request).await?;

    let view = ResolvedView::from(&resolved);
    output::print(&view, format, ResolvedView::to_text);
    Ok(())
}

/// Resolve, stream and decrypt a track into a file or stdout
pub async fn fetch(
    config: &ClientConfig,
    arl: String,
    request: &TrackStreamRequest,
    output: Option<PathBuf>,
    expected_len: Option<u64>,
) -> anyhow::Result<()> {
    let resolver = Resolver::connect(config, arl)?;
    let resolved = resolver.resolve(request).await?;
    info!(path = %resolved.path, "Track resolved");

    let decryptor = StreamDecryptor::http(config)?;
    let mut handle = decryptor.open_resolved(&resolved, expected_len).await?;

    let progress = match handle.total_len() {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
                    .progress_chars("=> "),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let mut sink: Box<dyn AsyncWrite + Unpin + Send> = match &output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    while let Some(chunk) = handle.chunk().await? {
        sink.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    sink.flush().await?;
    progress.finish_and_clear();

    info!(
        track_id = %resolved.track_id,
        bytes = handle.delivered(),
        output = ?output,
        "Track saved"
    );
    Ok(())
}
