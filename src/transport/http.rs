use crate::transport::TransportError;
use crate::{AudioStream, Error, ErrorContext, Result};
use futures::TryStreamExt;
use keyring::Entry;
use reqwest::header::HeaderMap;
use reqwest::Proxy;
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const KEYRING_SERVICE: &str = "resilient-tts";

/// How the static credential is attached to each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// Credential sent verbatim in a named header (e.g. `xi-api-key`).
    Header(String),
    /// `Authorization: Bearer <credential>`.
    Bearer,
}

/// Thin reqwest wrapper shared by the HTTP providers.
///
/// Non-success statuses are mapped to [`Error::Remote`] with any `Retry-After`
/// hint attached, so the retry loop can classify them without touching HTTP types.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    auth: AuthScheme,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("http_transport"),
            )
        })?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(
                env::var("TTS_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(16),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("TTS_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        if let Ok(proxy_url) = env::var("TTS_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            auth: AuthScheme::Header("xi-api-key".to_string()),
        })
    }

    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the provider credential: explicit value, then OS keyring, then `env_var`.
    pub fn resolve_api_key(explicit: Option<&str>, env_var: &str) -> Option<String> {
        if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }

        if let Ok(entry) = Entry::new(KEYRING_SERVICE, "api_key") {
            if let Ok(key) = entry.get_password() {
                return Some(key);
            }
        }

        env::var(env_var).ok().filter(|k| !k.trim().is_empty())
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthScheme::Header(name) => req.header(name.as_str(), self.api_key.as_str()),
            AuthScheme::Bearer => req.bearer_auth(&self.api_key),
        }
    }

    /// POST a JSON body and return the successful response, unread.
    pub async fn post_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
        accept: &str,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let request_id = Uuid::new_v4().to_string();
        let req = self
            .authorize(self.client.post(&url))
            .query(query)
            .header("accept", accept)
            .header("x-request-id", request_id.as_str())
            .json(body);

        let start = std::time::Instant::now();
        let resp = req.send().await.map_err(TransportError::Http)?;
        debug!(
            http_status = resp.status().as_u16(),
            request_id = request_id.as_str(),
            path,
            duration_ms = start.elapsed().as_millis() as u64,
            "tts request answered"
        );
        Self::check_status(resp).await
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .authorize(self.client.get(&url))
            .header("accept", "application/json")
            .send()
            .await
            .map_err(TransportError::Http)?;
        let resp = Self::check_status(resp).await?;
        let body = resp.bytes().await.map_err(TransportError::Http)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read a whole response body.
    pub async fn read_body(resp: reqwest::Response) -> Result<bytes::Bytes> {
        Ok(resp.bytes().await.map_err(TransportError::Http)?)
    }

    /// Turn a response body into a chunk stream. Dropping the stream closes the connection.
    pub fn into_audio_stream(resp: reqwest::Response) -> AudioStream {
        Box::pin(
            resp.bytes_stream()
                .map_err(|e| Error::Transport(TransportError::Http(e))),
        )
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let retry_after = retry_after_ms(resp.headers());
        let body = resp.text().await.unwrap_or_default();
        Err(Error::remote(status, body, retry_after))
    }
}

/// Extract the first matching header value from a list of header names.
pub(crate) fn header_first(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(v) = headers.get(*name) {
            if let Ok(s) = v.to_str() {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

/// Best-effort parsing of `retry-after-ms` or `Retry-After: <seconds>`.
///
/// HTTP-date values are ignored.
pub(crate) fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    if let Some(ms) = header_first(headers, &["retry-after-ms"]).and_then(|v| v.parse().ok()) {
        return Some(ms);
    }
    let raw = header_first(headers, &["retry-after"])?;
    let secs: f64 = raw.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3"));
        assert_eq!(retry_after_ms(&headers), Some(3000));
    }

    #[test]
    fn test_retry_after_ms_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3"));
        headers.insert("retry-after-ms", HeaderValue::from_static("250"));
        assert_eq!(retry_after_ms(&headers), Some(250));
    }

    #[test]
    fn test_retry_after_http_date_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_ms(&headers), None);
    }

    #[test]
    fn test_header_first_skips_blank() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("  "));
        headers.insert("request-id", HeaderValue::from_static("abc"));
        assert_eq!(
            header_first(&headers, &["x-request-id", "request-id"]),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = HttpTransport::new("not a url", "key", Duration::from_secs(1))
            .err()
            .expect("should fail");
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_explicit_api_key_preferred() {
        assert_eq!(
            HttpTransport::resolve_api_key(Some(" sk-live "), "TTS_TEST_UNUSED_KEY"),
            Some("sk-live".to_string())
        );
    }
}
