//! Thin HTTP client for the hosted Gemini REST API.
//!
//! Every request carries the credential in `x-goog-api-key` and is bounded by
//! the configured timeout; an expiry surfaces as [`Error::Timeout`].

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use docqa_core::config::Settings;
use docqa_core::{Error, Result};

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("provider API key is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key, timeout })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.api_key().ok_or_else(|| {
            Error::InvalidConfig("no API key: set provider.api_key, APP_PROVIDER__API_KEY or GOOGLE_API_KEY".to_string())
        })?;
        Self::new(&settings.provider.base_url, api_key, Duration::from_secs(settings.provider.request_timeout_secs))
    }

    /// POST `body` to `{base_url}/{path}` and decode the JSON reply.
    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(%url, "provider request");
        let res = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }
        res.json::<T>().await.map_err(|e| self.transport_error(&e))
    }

    fn transport_error(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(format!("provider did not answer within {}s", self.timeout.as_secs()))
        } else if e.is_decode() {
            Error::provider(None, format!("malformed provider response: {e}"))
        } else {
            Error::provider(e.status().map(|s| s.as_u16()), e)
        }
    }
}

/// Map a non-success reply to a provider error, keeping the API's message.
pub fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| match env.error.status {
            Some(s) if !s.is_empty() => format!("{s}: {}", env.error.message),
            _ => env.error.message,
        })
        .unwrap_or_else(|_| body.trim().to_string());
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication failed",
        StatusCode::TOO_MANY_REQUESTS => "quota exceeded",
        StatusCode::PAYLOAD_TOO_LARGE => "input too large",
        s if s.is_server_error() => "provider unavailable",
        _ => "request rejected",
    };
    Error::provider(Some(status.as_u16()), format!("{kind}: {detail}"))
}

/// `gemini-2.5-pro` and `models/gemini-2.5-pro` both name the same resource.
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") }
}
