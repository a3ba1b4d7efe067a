//! dzr CLI - headless track resolver and decryptor
//!
//! Features:
//! - Track key derivation
//! - Legacy URL synthesis
//! - Media URL resolution with fallbacks
//! - Streaming download with stripe decryption

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dzr_core::legacy::FALLBACK_QUALITY;
use dzr_core::{ClientConfig, Quality, TrackStreamRequest};

mod commands;
mod output;

/// dzr CLI - track resolution and decryption toolkit
#[derive(Parser)]
#[command(name = "dzr")]
#[command(version)]
#[command(about = "Resolve, decrypt and save catalog tracks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Path to a JSON client configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Session credential (`arl` cookie)
    #[arg(long, env = "DZR_ARL", hide_env_values = true, global = true)]
    arl: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the derived decryption key of a track
    Key {
        /// Numeric track id
        track_id: String,
    },

    /// Synthesize the legacy CDN URL of a track
    Url {
        /// Numeric track id
        track_id: String,

        /// Content-origin hash (MD5_ORIGIN)
        md5_origin: String,

        /// Media version (MEDIA_VERSION)
        media_version: String,

        /// Quality tier
        #[arg(short, long, default_value_t = FALLBACK_QUALITY)]
        quality: u8,
    },

    /// Resolve the playable URL of a track
    Resolve {
        #[command(flatten)]
        track: TrackArgs,
    },

    /// Resolve, download and decrypt a track
    Fetch {
        #[command(flatten)]
        track: TrackArgs,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Expected length in bytes, when known
        #[arg(long)]
        expected_len: Option<u64>,
    },
}

#[derive(clap::Args)]
struct TrackArgs {
    /// Numeric track id
    track_id: String,

    /// Per-track rights token (TRACK_TOKEN)
    #[arg(short, long)]
    track_token: String,

    /// Preferred quality (lossless, high, standard, low)
    #[arg(short, long, default_value = "high")]
    quality: Quality,

    /// MP3_MISC file size reported by the catalog
    #[arg(long)]
    file_size: Option<u64>,
}

impl TrackArgs {
    fn request(&self) -> TrackStreamRequest {
        let request = TrackStreamRequest::new(&self.track_id, &self.track_token).with_quality(self.quality);
        match self.file_size {
            Some(size) => request.with_file_size_hint(size),
            None => request,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `fetch` can write audio to stdout
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    dzr_core::init();

    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    match cli.command {
        Commands::Key { track_id } => {
            commands::key(&track_id, &cli.format)?;
        }
        Commands::Url { track_id, md5_origin, media_version, quality } => {
            commands::url(&track_id, &md5_origin, &media_version, quality, &cli.format)?;
        }
        Commands::Resolve { track } => {
            let arl = commands::require_arl(cli.arl)?;
            commands::resolve(&config, arl, &track.request(), &cli.format).await?;
        }
        Commands::Fetch { track, output, expected_len } => {
            let arl = commands::require_arl(cli.arl)?;
            commands::fetch(&config, arl, &track.request(), output, expected_len).await?;
        }
    }

    Ok(())
}
