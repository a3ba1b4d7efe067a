//! dzr Core - track resolution and stripe decryption
//!
//! This crate provides everything between a track id and playable audio bytes:
//! - Media URL resolution against the media endpoint, with fallbacks
//! - Per-track key derivation
//! - Legacy CDN URL synthesis
//! - Streaming Blowfish-CBC "stripe" decryption with bounded backpressure
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           dzr Core                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Session    │  │   Catalog    │  │    Media     │           │
//! │  │   Provider   │  │   (gateway)  │  │   Service    │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         └─────────────────┼─────────────────┘                   │
//! │                    ┌──────┴──────┐     ┌──────────────┐         │
//! │                    │  Resolver   │────▶│    Legacy    │         │
//! │                    └──────┬──────┘     │  Synthesizer │         │
//! │                           │            └──────────────┘         │
//! │                   ResolvedMedia (url + CipherContext)           │
//! │                           │                                     │
//! │                    ┌──────┴──────┐     ┌──────────────┐         │
//! │                    │   Stream    │────▶│ StreamHandle │──▶ app  │
//! │                    │  Decryptor  │     │  (AsyncRead) │         │
//! │                    └─────────────┘     └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod legacy;
pub mod resolver;
pub mod session;
pub mod stream;
pub mod types;

pub use api::{Catalog, GatewayCatalog, GatewayClient, HttpMediaService, MediaService};
pub use config::{ClientConfig, StreamConfig};
pub use crypto::{derive_key, CipherContext};
pub use error::{Error, Result};
pub use legacy::{synthesize, synthesize_url};
pub use resolver::Resolver;
pub use session::{ArlSession, Credentials, SessionProvider, StaticSession};
pub use stream::{ChunkSource, HttpFetcher, MediaFetcher, StreamDecryptor, StreamHandle, StripeDecoder};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version once at startup
pub fn init() {
    tracing::info!(version = VERSION, "dzr core initialized");
}
