// API client module: a small blocking HTTP client for the b3scale API.
// The hook makes a single request per run, so there is no need for an
// async runtime here.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

const API_PREFIX: &str = "api/v1";
const RECORDINGS_IMPORT: &str = "recordings-import";
const CONTENT_TYPE_XML: &str = "application/xml";

/// Errors from talking to the b3scale API. Transport failures are split
/// by cause so the caller can tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid access token")]
    InvalidToken,

    #[error("invalid API URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("could not connect to API: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("access denied ({status}): {error}")]
    Unauthorized { status: u16, error: ServerError },

    #[error("the resource could not be found (404)")]
    NotFound,

    #[error("API rejected the request ({status}): {error}")]
    Rejected { status: u16, error: ServerError },
}

impl ApiError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err)
        } else if err.is_connect() {
            ApiError::Connect(err)
        } else {
            ApiError::Transport(err)
        }
    }

    /// HTTP status for errors that came with a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status, .. } | ApiError::Rejected { status, .. } => {
                Some(*status)
            }
            ApiError::NotFound => Some(StatusCode::NOT_FOUND.as_u16()),
            _ => None,
        }
    }
}

/// Decoded body of a failed response. The API answers with a JSON
/// object such as `{"error": "...", "message": "..."}`; anything else is
/// kept verbatim under `error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerError(pub BTreeMap<String, serde_json::Value>);

impl ServerError {
    pub fn from_body(body: &str) -> Self {
        if body.trim().is_empty() {
            return ServerError::default();
        }
        match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(body) {
            Ok(fields) => ServerError(fields),
            Err(_) => {
                let mut fields = BTreeMap::new();
                fields.insert("error".to_string(), serde_json::Value::String(body.to_string()));
                ServerError(fields)
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{k}: {s}"),
                other => format!("{k}: {other}"),
            })
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// The subset of the imported recording echoed back by the API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportedRecording {
    #[serde(rename = "RecordID", default)]
    pub record_id: Option<String>,
    #[serde(rename = "MeetingID", default)]
    pub meeting_id: Option<String>,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReceipt {
    pub status: u16,
    /// `None` when the response body was empty or not the expected JSON.
    pub recording: Option<ImportedRecording>,
}

/// Blocking client holding the reqwest client with the bearer header
/// installed, and the API base URL.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the b3scale instance at `base_url`. The base
    /// may be the bare host or already end in `/api/v1`.
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = parse_base_url(base_url)?;

        if access_token.trim().is_empty() {
            return Err(ApiError::InvalidToken);
        }
        let mut bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| ApiError::InvalidToken)?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(ApiClient { client, base_url })
    }

    /// Build the URL of an API v1 resource.
    fn api_url(&self, resource: &str) -> Url {
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        let path = if base_path.ends_with(&format!("/{API_PREFIX}")) {
            format!("{base_path}/{resource}")
        } else {
            format!("{base_path}/{API_PREFIX}/{resource}")
        };
        url.set_path(&path);
        url
    }

    pub fn recordings_import_url(&self) -> Url {
        self.api_url(RECORDINGS_IMPORT)
    }

    /// Upload the contents of a recording's metadata.xml. The body is
    /// sent as is.
    pub fn import_recording(&self, metadata: Vec<u8>) -> Result<ImportReceipt, ApiError> {
        let url = self.recordings_import_url();
        tracing::debug!(%url, bytes = metadata.len(), "posting recording metadata");

        let res = self
            .client
            .post(url)
            .header(CONTENT_TYPE, CONTENT_TYPE_XML)
            .body(metadata)
            .send()
            .map_err(ApiError::from_transport)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        let body = res.text().map_err(ApiError::from_transport)?;
        let recording = serde_json::from_str::<ImportedRecording>(&body).ok();
        Ok(ImportReceipt {
            status: status.as_u16(),
            recording,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
            status: status.as_u16(),
            error: ServerError::from_body(body),
        },
        _ => ApiError::Rejected {
            status: status.as_u16(),
            error: ServerError::from_body(body),
        },
    }
}
