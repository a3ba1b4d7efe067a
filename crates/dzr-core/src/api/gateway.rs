//! Gateway (`gw-light.php`) JSON client

use reqwest::header::{HeaderMap, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{build_client, is_invalid_session};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::Credentials;

/// Account data returned by `deezer.getUserData`
#[derive(Debug, Clone, Default)]
pub struct UserData {
    pub user_id: String,
    pub api_token: String,
    pub license_token: String,
    /// Fresh `sid` from `Set-Cookie`, when the service issued one
    pub sid: Option<String>,
}

/// Client for gateway method calls
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    endpoint: Url,
    language: String,
}

impl GatewayClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            endpoint: config.gateway_url.clone(),
            language: config.language.clone(),
        }
    }

    /// Call a gateway method and return its `results` object.
    ///
    /// A stale session surfaces as [`Error::InvalidSession`].
    #[instrument(skip(self, credentials, params))]
    pub async fn call(&self, credentials: &Credentials, method: &str, params: Value) -> Result<Value> {
        let (_, body) = self.send(credentials, method, params).await?;
        parse_results(&body)
    }

    /// Fetch account tokens for the session credential
    pub async fn user_data(&self, credentials: &Credentials) -> Result<UserData> {
        let (headers, body) = self
            .send(credentials, "deezer.getUserData", Value::Object(Default::default()))
            .await
            .map_err(|e| match e {
                Error::InvalidSession => Error::Auth("session credential rejected".into()),
                other => other,
            })?;

        let results = parse_results(&body)?;
        let user = &results["USER"];

        Ok(UserData {
            user_id: value_string(&user["USER_ID"]).unwrap_or_default(),
            api_token: value_string(&results["checkForm"]).unwrap_or_default(),
            license_token: value_string(&user["OPTIONS"]["license_token"]).unwrap_or_default(),
            sid: sid_from_headers(&headers),
        })
    }

    async fn send(&self, credentials: &Credentials, method: &str, params: Value) -> Result<(HeaderMap, String)> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("method", method)
            .append_pair("input", "3")
            .append_pair("api_version", "1.0")
            .append_pair("api_token", &credentials.api_token);

        debug!(method, "Gateway call");

        let response = self
            .client
            .post(url)
            .header(ACCEPT_LANGUAGE, &self.language)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(COOKIE, credentials.cookie_header())
            .body(params.to_string())
            .send()
            .await?;

        let headers = response.headers().clone();
        let body = response.text().await?;

        if is_invalid_session(&body) {
            return Err(Error::InvalidSession);
        }

        Ok((headers, body))
    }
}

/// Extract `results`, failing on a populated `error` field
pub(crate) fn parse_results(body: &str) -> Result<Value> {
    let mut value: Value = serde_json::from_str(body)?;

    let has_error = match value.get("error") {
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(list)) => !list.is_empty(),
        _ => false,
    };
    if has_error {
        return Err(Error::Api(value["error"].to_string()));
    }

    value
        .as_object_mut()
        .and_then(|map| map.remove("results"))
        .ok_or_else(|| Error::Api("response has no results".into()))
}

/// Read a JSON string or number as a string
pub(crate) fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn sid_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| cookie.strip_prefix("sid="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}
