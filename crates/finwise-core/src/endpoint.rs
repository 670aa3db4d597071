use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{BoxError, EndpointError};
use crate::state::RateLimitInfo;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "X-Ratelimit-Limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-Ratelimit-Remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "X-Ratelimit-Reset";

/// Body sent to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Raw response body, delivered incrementally.
pub type ByteChannel = BoxStream<'static, Result<Bytes, BoxError>>;

pub enum EndpointResponse {
    /// Status 200-299. `body` is `None` when the response carries no body at
    /// all (204/205), which is different from a body that turns out empty.
    Success { body: Option<ByteChannel> },
    /// Any other status.
    Rejected {
        status: u16,
        body: String,
        rate_limit: RateLimitInfo,
    },
}

impl std::fmt::Debug for EndpointResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointResponse::Success { body } => f
                .debug_struct("Success")
                .field("has_body", &body.is_some())
                .finish(),
            EndpointResponse::Rejected {
                status,
                body,
                rate_limit,
            } => f
                .debug_struct("Rejected")
                .field("status", status)
                .field("body", body)
                .field("rate_limit", rate_limit)
                .finish(),
        }
    }
}

/// Something that can turn a prompt into a streamed response.
#[async_trait]
pub trait GenerationEndpoint: Send + Sync {
    /// Issue exactly one request and return once the response headers are in.
    async fn generate(&self, request: &GenerationRequest) -> Result<EndpointResponse, EndpointError>;
}

/// Generation endpoint reached over HTTP.
#[derive(Clone)]
pub struct HttpEndpoint {
    client: Client,
    url: String,
}

impl HttpEndpoint {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }

    /// Build from the effective configuration (endpoint URL and timeout).
    pub fn from_config(config: &Config) -> Result<Self, EndpointError> {
        Self::with_timeout(&config.endpoint_url(), config.request_timeout())
    }

    pub fn with_timeout(url: &str, timeout: Option<Duration>) -> Result<Self, EndpointError> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GenerationEndpoint for HttpEndpoint {
    async fn generate(&self, request: &GenerationRequest) -> Result<EndpointResponse, EndpointError> {
        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %self.url, "generation endpoint responded");

        if !status.is_success() {
            let rate_limit = rate_limit_from_headers(response.headers());
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    warn!(status = status.as_u16(), error = %err, "could not read rejection body");
                    format!("unreadable response body: {err}")
                }
            };
            return Ok(EndpointResponse::Rejected {
                status: status.as_u16(),
                body,
                rate_limit,
            });
        }

        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Ok(EndpointResponse::Success { body: None });
        }

        let expected = response.content_length();
        let mut received: u64 = 0;
        let body = response
            .bytes_stream()
            .map(move |delivery| match delivery {
                Ok(bytes) => {
                    received += bytes.len() as u64;
                    Ok(bytes)
                }
                Err(err) => Err(body_error(err, expected, received)),
            })
            .boxed();
        Ok(EndpointResponse::Success { body: Some(body) })
    }
}

/// A body that stops before its declared `Content-Length` was cut short,
/// which is reported as `UnexpectedEof` rather than a connection failure.
fn body_error(err: reqwest::Error, expected: Option<u64>, received: u64) -> BoxError {
    match expected {
        Some(expected) if err.is_body() && received < expected => Box::new(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("body ended after {received} of {expected} bytes: {err}"),
        )),
        _ => Box::new(err),
    }
}

/// Read the three rate-limit headers. Missing or non-text values become `None`.
pub fn rate_limit_from_headers(headers: &HeaderMap) -> RateLimitInfo {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    RateLimitInfo {
        limit: get(RATE_LIMIT_LIMIT_HEADER),
        remaining: get(RATE_LIMIT_REMAINING_HEADER),
        reset_at: get(RATE_LIMIT_RESET_HEADER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_request_serializes_prompt_only() {
        let json = serde_json::to_value(GenerationRequest::new("I have debt")).unwrap();
        assert_eq!(json, serde_json::json!({ "prompt": "I have debt" }));
    }

    #[test]
    fn test_rate_limit_headers_present() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("10"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let info = rate_limit_from_headers(&headers);
        assert_eq!(info.limit.as_deref(), Some("10"));
        assert_eq!(info.remaining.as_deref(), Some("0"));
        assert_eq!(info.reset_at.as_deref(), Some("1700000000"));
    }

    #[test]
    fn test_rate_limit_headers_absent() {
        let info = rate_limit_from_headers(&HeaderMap::new());
        assert!(info.is_empty());
    }

    #[test]
    fn test_rate_limit_partial_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static(""));
        let info = rate_limit_from_headers(&headers);
        assert_eq!(info.remaining.as_deref(), Some(""));
        assert_eq!(info.limit, None);
    }
}
