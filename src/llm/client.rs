// src/llm/client.rs
// Inference client: one prompt in, generated text or a typed failure out.
// Retries rate limits and transient network errors with exponential backoff.

use crate::config::InferenceConfig;
use crate::llm::transport::{GeminiTransport, Transport};
use crate::llm::types::{GenerateRequest, GenerateResponse, error_message};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Every failure marker starts with this text
pub const FAILURE_PREFIX: &str = "Inference failed";

/// Longest slice of a raw error body carried into a marker
const MAX_ERROR_DETAIL: usize = 200;

/// Why no answer could be obtained. `Display` renders the failure marker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceFailure {
    #[error("Inference failed: max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    #[error("Inference failed: interrupted by user")]
    Interrupted,

    #[error("Inference failed: HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Inference failed: malformed response: {0}")]
    MalformedResponse(String),

    #[error("Inference failed: {0}")]
    Request(String),
}

impl InferenceFailure {
    /// Marker text handed to the output parser
    pub fn marker(&self) -> String {
        self.to_string()
    }
}

/// True when `text` is a failure marker rather than a model answer
pub fn is_failure_marker(text: &str) -> bool {
    text.trim_start().starts_with(FAILURE_PREFIX)
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let config = InferenceConfig::default();
        Self::from(&config)
    }
}

impl From<&InferenceConfig> for RetryPolicy {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: config.base_backoff,
        }
    }
}

/// Inference client wrapping a transport with the retry policy
#[derive(Clone)]
pub struct InferenceClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl InferenceClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Client talking to Gemini with the configured endpoint and policy
    pub fn gemini(api_key: String, config: &InferenceConfig) -> Self {
        Self::new(
            Arc::new(GeminiTransport::new(api_key, config)),
            RetryPolicy::from(config),
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send `prompt` and return the trimmed generated text.
    ///
    /// Cancellation is checked before every attempt and raced against every
    /// backoff sleep; an in-flight request is allowed to finish.
    pub async fn infer(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, InferenceFailure> {
        let request_id = Uuid::new_v4().to_string();
        let start_time = Instant::now();
        let body = serde_json::to_string(&GenerateRequest::from_prompt(prompt))
            .map_err(|e| InferenceFailure::Request(e.to_string()))?;

        let max_attempts = self.policy.max_retries.max(1);
        let mut backoff = self.policy.base_backoff;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                debug!(request_id = %request_id, "Cancelled before attempt {}", attempt);
                return Err(InferenceFailure::Interrupted);
            }

            let retry_reason = match self.transport.send(&request_id, body.clone()).await {
                Ok(response) if response.is_success() => {
                    let result = extract_answer(response.status, &response.body);
                    if result.is_ok() {
                        info!(
                            request_id = %request_id,
                            attempt,
                            duration_ms = start_time.elapsed().as_millis() as u64,
                            "Inference complete"
                        );
                    }
                    return result;
                }
                Ok(response) if response.is_retryable() => format!("HTTP {}", response.status),
                Ok(response) => {
                    let message = error_message(&response.body)
                        .unwrap_or_else(|| truncate(&response.body, MAX_ERROR_DETAIL));
                    warn!(
                        request_id = %request_id,
                        status = response.status,
                        error = %message,
                        "Non-retryable API error"
                    );
                    return Err(InferenceFailure::Http {
                        status: response.status,
                        message,
                    });
                }
                Err(e) if e.is_transient() => e.to_string(),
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Request failed");
                    return Err(InferenceFailure::Request(e.to_string()));
                }
            };

            if attempt == max_attempts {
                break;
            }

            warn!(
                request_id = %request_id,
                attempt,
                reason = %retry_reason,
                "Transient error, retrying in {:?}...",
                backoff
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(request_id = %request_id, "Backoff interrupted");
                    return Err(InferenceFailure::Interrupted);
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff *= 2;
        }

        warn!(
            request_id = %request_id,
            attempts = max_attempts,
            "Giving up after max retries"
        );
        Err(InferenceFailure::MaxRetriesExceeded {
            attempts: max_attempts,
        })
    }
}

fn extract_answer(status: u16, body: &str) -> Result<String, InferenceFailure> {
    let data: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| InferenceFailure::MalformedResponse(e.to_string()))?;

    if let Some(err) = data.error.as_ref() {
        return Err(InferenceFailure::Http {
            status: err.code.unwrap_or(status),
            message: err
                .message
                .clone()
                .unwrap_or_else(|| "unspecified API error".to_string()),
        });
    }

    data.first_text()
        .map(|text| text.trim().to_string())
        .ok_or_else(|| {
            InferenceFailure::MalformedResponse(
                "missing candidates[0].content.parts[0].text".to_string(),
            )
        })
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::transport::{TransportError, TransportResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays scripted responses; repeats the last one when exhausted
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        last: Mutex<Option<Result<TransportResponse, TransportError>>>,
        calls: AtomicU32,
        sent_at: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
                sent_at: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request_id: &str, _body: String) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent_at.lock().unwrap().push(tokio::time::Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(item) => {
                    *self.last.lock().unwrap() = Some(item.clone());
                    item
                }
                None => self.last.lock().unwrap().clone().expect("empty script"),
            }
        }
    }

    fn ok_body(text: &str) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status: 200,
            body: serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
                .to_string(),
        })
    }

    fn status(code: u16, body: &str) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status: code,
            body: body.to_string(),
        })
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_backoff: Duration::from_secs(4),
        }
    }

    // ========================================================================
    // Success and non-retryable paths
    // ========================================================================

    #[tokio::test]
    async fn test_success_returns_trimmed_text() {
        let transport = ScriptedTransport::new(vec![ok_body("  Conflict_Type: Cost Conflict||Reason: x \n")]);
        let client = InferenceClient::new(transport.clone(), policy(5));

        let text = client.infer("prompt", &CancellationToken::new()).await.unwrap();
        assert_eq!(text, "Conflict_Type: Cost Conflict||Reason: x");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        let transport = ScriptedTransport::new(vec![status(400, body)]);
        let client = InferenceClient::new(transport.clone(), policy(5));

        let err = client.infer("prompt", &CancellationToken::new()).await.unwrap_err();
        assert_eq!(
            err,
            InferenceFailure::Http {
                status: 400,
                message: "API key not valid".to_string()
            }
        );
        assert_eq!(transport.calls(), 1);
        assert!(is_failure_marker(&err.marker()));
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_not_retried() {
        let transport = ScriptedTransport::new(vec![status(200, r#"{"candidates":[]}"#)]);
        let client = InferenceClient::new(transport.clone(), policy(5));

        let err = client.infer("prompt", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, InferenceFailure::MalformedResponse(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_error_envelope_on_success_status() {
        let transport = ScriptedTransport::new(vec![status(200, r#"{"error":{"message":"quota"}}"#)]);
        let client = InferenceClient::new(transport, policy(5));

        let err = client.infer("prompt", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, InferenceFailure::Http { status: 200, .. }));
    }

    // ========================================================================
    // Retry behavior (paused clock)
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_permanent_rate_limit_hits_retry_bound() {
        let transport = ScriptedTransport::new(vec![status(429, "slow down")]);
        let client = InferenceClient::new(transport.clone(), policy(5));

        let err = client.infer("prompt", &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, InferenceFailure::MaxRetriesExceeded { attempts: 5 });
        assert_eq!(transport.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_from_base() {
        let transport = ScriptedTransport::new(vec![status(429, ""), status(429, ""), status(429, ""), ok_body("done")]);
        let client = InferenceClient::new(transport.clone(), policy(5));

        let text = client.infer("prompt", &CancellationToken::new()).await.unwrap();
        assert_eq!(text, "done");

        let sent_at = transport.sent_at.lock().unwrap().clone();
        let gaps: Vec<Duration> = sent_at.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![Duration::from_secs(4), Duration::from_secs(8), Duration::from_secs(16)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_network_error_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout("deadline".into())),
            Err(TransportError::Connect("refused".into())),
            ok_body("Conflict_Type: No Conflict||Reason: fine"),
        ]);
        let client = InferenceClient::new(transport.clone(), policy(5));

        let text = client.infer("prompt", &CancellationToken::new()).await.unwrap();
        assert!(text.starts_with("Conflict_Type"));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_non_transient_transport_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Other("builder".into()))]);
        let client = InferenceClient::new(transport.clone(), policy(5));

        let err = client.infer("prompt", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, InferenceFailure::Request(_)));
        assert_eq!(transport.calls(), 1);
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    #[tokio::test]
    async fn test_cancelled_before_dispatch_makes_no_call() {
        let transport = ScriptedTransport::new(vec![ok_body("unused")]);
        let client = InferenceClient::new(transport.clone(), policy(5));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.infer("prompt", &cancel).await.unwrap_err();
        assert_eq!(err, InferenceFailure::Interrupted);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_aborts() {
        let transport = ScriptedTransport::new(vec![status(429, "")]);
        let client = InferenceClient::new(transport.clone(), policy(5));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = client.infer("prompt", &cancel).await.unwrap_err();
        assert_eq!(err, InferenceFailure::Interrupted);
        assert_eq!(transport.calls(), 1);
    }

    // ========================================================================
    // Markers
    // ========================================================================

    #[test]
    fn test_every_failure_renders_marker_prefix() {
        let failures = [
            InferenceFailure::MaxRetriesExceeded { attempts: 5 },
            InferenceFailure::Interrupted,
            InferenceFailure::Http { status: 403, message: "forbidden".into() },
            InferenceFailure::MalformedResponse("bad".into()),
            InferenceFailure::Request("oops".into()),
        ];
        for failure in failures {
            assert!(is_failure_marker(&failure.marker()), "{}", failure);
        }
        assert!(!is_failure_marker("Conflict_Type: Cost Conflict||Reason: x"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short ", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_backoff, Duration::from_secs(4));
    }
}
