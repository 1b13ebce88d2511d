// src/llm/transport.rs
// Network seam for inference calls - one POST per attempt, no retry logic here

use crate::config::InferenceConfig;
use crate::http::create_shared_client;
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// Raw HTTP outcome of one attempt
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

/// Failure before an HTTP status was obtained
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Connection and timeout errors are safe to retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Sends one serialized request body to the inference endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request_id: &str, body: String) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport for Gemini generateContent.
/// Authenticates via the `key` query parameter, not a Bearer header.
pub struct GeminiTransport {
    client: Client,
    url: String,
    api_key: String,
}

impl GeminiTransport {
    pub fn new(api_key: String, config: &InferenceConfig) -> Self {
        Self::with_http_client(api_key, config, create_shared_client(config.timeout))
    }

    pub fn with_http_client(api_key: String, config: &InferenceConfig, client: Client) -> Self {
        Self {
            client,
            url: generate_url(&config.endpoint, &config.model),
            api_key,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `{endpoint}/{model}:generateContent`
pub fn generate_url(endpoint: &str, model: &str) -> String {
    format!("{}/{}:generateContent", endpoint.trim_end_matches('/'), model)
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn send(&self, request_id: &str, body: String) -> Result<TransportResponse, TransportError> {
        debug!(request_id = %request_id, url = %self.url, "Sending generateContent request");

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
