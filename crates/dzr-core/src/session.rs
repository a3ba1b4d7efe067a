//! Session context - credentials and the one-shot refresh
//!
//! Credentials are an explicit value handed to every service call. A
//! [`SessionProvider`] owns them and knows how to obtain fresh ones; the
//! resolver decides when that happens.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::api::gateway::GatewayClient;
use crate::error::{Error, Result};

/// Session material for one user
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Long-lived session credential (`arl` cookie)
    pub arl: String,
    /// Short-lived session id (`sid` cookie)
    pub sid: String,
    /// Gateway CSRF token (`checkForm`)
    pub api_token: String,
    /// Media license token
    pub license_token: String,
}

impl Credentials {
    pub fn new(arl: impl Into<String>) -> Self {
        Self {
            arl: arl.into(),
            ..Default::default()
        }
    }

    /// `Cookie` header value for gateway calls
    pub fn cookie_header(&self) -> String {
        if self.sid.is_empty() {
            format!("arl={}", self.arl)
        } else {
            format!("arl={}; sid={}", self.arl, self.sid)
        }
    }

    /// Whether the tokens needed for media requests are present
    pub fn is_complete(&self) -> bool {
        !self.arl.is_empty() && !self.api_token.is_empty() && !self.license_token.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("arl", &redact(&self.arl))
            .field("sid", &redact(&self.sid))
            .field("api_token", &redact(&self.api_token))
            .field("license_token", &redact(&self.license_token))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Supplies credentials and refreshes them on request
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current credentials
    async fn credentials(&self) -> Result<Credentials>;

    /// Obtain new credentials after the service rejected the current ones
    async fn refresh(&self) -> Result<Credentials>;
}

/// Fixed credentials that cannot be refreshed
pub struct StaticSession {
    credentials: Credentials,
}

impl StaticSession {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn credentials(&self) -> Result<Credentials> {
        if self.credentials.arl.is_empty() {
            return Err(Error::Auth("no session credential configured".into()));
        }
        Ok(self.credentials.clone())
    }

    async fn refresh(&self) -> Result<Credentials> {
        Err(Error::Auth("session expired, please log in again".into()))
    }
}

/// Session backed by an `arl` cookie; tokens are fetched from the gateway
pub struct ArlSession {
    gateway: GatewayClient,
    state: RwLock<Credentials>,
}

impl ArlSession {
    pub fn new(gateway: GatewayClient, arl: impl Into<String>) -> Self {
        Self {
            gateway,
            state: RwLock::new(Credentials::new(arl)),
        }
    }
}

#[async_trait]
impl SessionProvider for ArlSession {
    async fn credentials(&self) -> Result<Credentials> {
        let current = self.state.read().await.clone();
        if current.is_complete() {
            return Ok(current);
        }
        debug!("Session tokens missing, logging in");
        self.refresh().await
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<Credentials> {
        let mut state = self.state.write().await;
        if state.arl.is_empty() {
            return Err(Error::Auth("no session credential configured".into()));
        }

        let user = self.gateway.user_data(&state).await?;
        if user.user_id == "0" || user.user_id.is_empty() {
            return Err(Error::Auth("session credential rejected".into()));
        }

        state.api_token = user.api_token;
        state.license_token = user.license_token;
        if let Some(sid) = user.sid {
            state.sid = sid;
        }

        info!(user_id = %user.user_id, "Session refreshed");
        Ok(state.clone())
    }
}
