//! Service clients
//!
//! Thin JSON clients for the two service surfaces the resolver needs:
//! - the gateway (`gw-light.php`), for track metadata and session tokens
//! - the media endpoint (`/v1/get_url`), for playable sources
//!
//! Both sit behind traits so the resolver can be driven by test doubles.

pub mod catalog;
pub mod gateway;
pub mod media;

pub use catalog::{Catalog, GatewayCatalog};
pub use gateway::GatewayClient;
pub use media::{HttpMediaService, MediaService};

use reqwest::Client;

use crate::config::ClientConfig;
use crate::error::Result;

/// Body fragment the service returns when the CSRF/session token is stale
pub const INVALID_SESSION_MARKER: &str = r#""VALID_TOKEN_REQUIRED":"Invalid CSRF token""#;

/// Error message for a track token without rights on the requested media
pub const INSUFFICIENT_RIGHTS_MARKER: &str = "Track token has no sufficient rights on requested media";

/// Build the HTTP client shared by the JSON service calls
pub fn build_client(config: &ClientConfig) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .build()?)
}

/// Whether a raw response body reports a stale session
pub fn is_invalid_session(body: &str) -> bool {
    body.contains(INVALID_SESSION_MARKER)
}
