use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use url::Url;

pub mod auth;
pub mod playlist;
pub mod search;

pub use auth::{SubsonicCredentials, auth_query_pairs};

/// Connection details for one Subsonic-compatible server (Navidrome, Gonic, ...).
///
/// Docs:
/// https://www.subsonic.org/pages/api.jsp
#[derive(Debug, Clone)]
pub struct SubsonicServer {
    /// REST root, e.g. `http://localhost:4533/rest/`
    pub base_url: Url,
    pub credentials: SubsonicCredentials,
    pub api_version: String,
    pub client_name: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl SubsonicServer {
    /// Builds the URL for `method` with auth parameters already attached.
    pub fn endpoint(&self, method: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(method)
            .wrap_err_with(|| format!("Failed to build URL for {}", method))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in auth_query_pairs(&self.credentials, &self.api_version, &self.client_name)
            {
                query.append_pair(key, &value);
            }
        }
        Ok(url)
    }
}

/// Makes sure the REST root ends in a slash so `Url::join` appends instead of replacing.
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    Url::parse(&format!("{}/", trimmed)).wrap_err_with(|| format!("Invalid base URL: {}", raw))
}

#[derive(Debug, thiserror::Error)]
pub enum SubsonicError {
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Server responded with an error status: {0}")]
    HttpStatus(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
    #[error("Subsonic request failed (code {code}): {message}")]
    Failed { code: i32, message: String },
}

/* ---------- Core response envelope ---------- */

#[derive(Debug, Deserialize)]
pub struct SubsonicEnvelope<T> {
    #[serde(rename = "subsonic-response")]
    pub response: SubsonicResponse<T>,
}

#[derive(Debug, Deserialize)]
pub struct SubsonicResponse<T> {
    pub status: String,

    #[serde(default)]
    pub error: Option<SubsonicApiError>,

    #[serde(flatten)]
    pub body: T,
}

#[derive(Debug, Deserialize)]
pub struct SubsonicApiError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Body for methods whose response carries nothing but the status.
#[derive(Debug, Default, Deserialize)]
pub struct EmptyBody {}

impl<T> SubsonicEnvelope<T> {
    pub fn into_body(self) -> Result<T, SubsonicError> {
        let response = self.response;
        if response.status == "ok" {
            return Ok(response.body);
        }

        let (code, message) = response
            .error
            .map(|e| (e.code, e.message))
            .unwrap_or((0, format!("status '{}'", response.status)));
        Err(SubsonicError::Failed { code, message })
    }
}

/// Subsonic servers disagree on whether ids are strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/* ---------- Transport helpers ---------- */

pub(crate) async fn get<T: DeserializeOwned>(
    client: &Client,
    server: &SubsonicServer,
    method: &str,
    params: &[(&str, String)],
) -> Result<T> {
    let mut url = server.endpoint(method)?;
    url.query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

    log::debug!("GET {} ({} params)", method, params.len());

    let response = client
        .get(url)
        .timeout(server.read_timeout)
        .send()
        .await
        .map_err(SubsonicError::FailedToSendRequest)?;

    parse_response(response)
        .await
        .wrap_err_with(|| format!("Subsonic {} failed", method))
}

pub(crate) async fn post<T: DeserializeOwned>(
    client: &Client,
    server: &SubsonicServer,
    method: &str,
    params: &[(&str, String)],
) -> Result<T> {
    let mut url = server.endpoint(method)?;
    url.query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

    log::debug!("POST {} ({} params)", method, params.len());

    let response = client
        .post(url)
        .timeout(server.write_timeout)
        .send()
        .await
        .map_err(SubsonicError::FailedToSendRequest)?;

    parse_response(response)
        .await
        .wrap_err_with(|| format!("Subsonic {} failed", method))
}

async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SubsonicError> {
    let envelope = response
        .error_for_status()
        .map_err(SubsonicError::HttpStatus)?
        .json::<SubsonicEnvelope<T>>()
        .await
        .map_err(SubsonicError::FailedToParseResponse)?;

    envelope.into_body()
}
