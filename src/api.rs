use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

pub const UPLOAD_PATH: &str = "/upload";
pub const POSTS_PATH: &str = "/get-posts";
pub const COMMENTS_PATH: &str = "/get-comments";
pub const REPLY_PATH: &str = "/reply";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    /// `None` leaves requests unbounded; an upload can take minutes server-side.
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Failures below the application layer. Every variant is folded into an
/// error envelope by [`Client::send`], so nothing here reaches the UI as a
/// Rust error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response (HTTP {status}): {reason}")]
    InvalidResponse { status: u16, reason: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    fn network(err: &reqwest::Error) -> Self {
        TransportError::Network(error_chain(err))
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// The `{status, message?, data?}` shape every endpoint answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    #[serde(default)]
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self {
            status: Status::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.message.as_deref() {
            Some(message) if !message.trim().is_empty() => message,
            _ => fallback,
        }
    }
}

impl<T> Envelope<Vec<T>> {
    /// Items of a successful envelope, or `None` when the call failed or came
    /// back empty.
    pub fn non_empty(&self) -> Option<&[T]> {
        if !self.is_success() {
            return None;
        }
        match self.data.as_deref() {
            Some(items) if !items.is_empty() => Some(items),
            _ => None,
        }
    }
}

impl From<TransportError> for Envelope<Value> {
    fn from(err: TransportError) -> Self {
        Envelope::error(err.to_string())
    }
}

impl Envelope<Value> {
    /// Reinterprets `data` as `U`. Data that does not fit is dropped rather
    /// than failing the whole envelope.
    pub fn decode<U: DeserializeOwned>(self) -> Envelope<U> {
        let data = self
            .data
            .and_then(|value| match serde_json::from_value::<U>(value) {
                Ok(decoded) => Some(decoded),
                Err(err) => {
                    warn!(error = %err, "discarding malformed response data");
                    None
                }
            });
        Envelope {
            status: self.status,
            message: self.message,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub media_type: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Reel,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Image, MediaType::Video, MediaType::Reel];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Reel => "reel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub media_type: MediaType,
    pub media_url: String,
    pub caption: String,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api client user agent required");
        }
        let base = if config.base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url.trim().to_string()
        };
        let mut base_url =
            Url::parse(&base).with_context(|| format!("parse backend base url {base:?}"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout)
                .build()
                .context("build backend HTTP client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issues one request and always hands back an envelope. Transport
    /// failures become `status: "error"` with a categorised message; a parsed
    /// body is returned as-is whatever the HTTP status code was.
    pub fn send<B>(&self, path: &str, body: Option<&B>, method: Method) -> Envelope
    where
        B: Serialize + ?Sized,
    {
        match self.try_send(path, body, method.clone()) {
            Ok(envelope) => {
                info!(%method, path, status = ?envelope.status, "backend call finished");
                envelope
            }
            Err(err) => {
                warn!(%method, path, error = %err, "backend call failed");
                err.into()
            }
        }
    }

    fn try_send<B>(
        &self,
        path: &str,
        body: Option<&B>,
        method: Method,
    ) -> Result<Envelope, TransportError>
    where
        B: Serialize + ?Sized,
    {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| TransportError::InvalidRequest(format!("{path}: {err}")))?;

        debug!(%method, %url, has_body = body.is_some(), "sending backend request");
        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(payload) = body {
            let bytes = serde_json::to_vec(payload)
                .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
            req = req.body(bytes);
        }

        let resp = req.send().map_err(|err| TransportError::network(&err))?;
        let status = resp.status().as_u16();
        let text = resp.text().map_err(|err| TransportError::network(&err))?;
        serde_json::from_str::<Envelope>(&text).map_err(|err| TransportError::InvalidResponse {
            status,
            reason: err.to_string(),
        })
    }

    pub fn upload(&self, request: &UploadRequest) -> Envelope {
        self.send(UPLOAD_PATH, Some(request), Method::POST)
    }

    pub fn posts(&self) -> Envelope<Vec<Post>> {
        self.send::<Value>(POSTS_PATH, None, Method::GET).decode()
    }

    pub fn comments(&self, media_id: &str) -> Envelope<Vec<Comment>> {
        let body = json!({ "media_id": media_id });
        self.send(COMMENTS_PATH, Some(&body), Method::POST).decode()
    }

    pub fn reply(&self, comment_id: &str, message: &str) -> Envelope {
        let body = json!({ "comment_id": comment_id, "message": message });
        self.send(REPLY_PATH, Some(&body), Method::POST)
    }
}
