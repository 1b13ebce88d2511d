// src/llm/mod.rs
// Inference endpoint access: transport, retrying client, response cache

pub mod cache;
pub mod client;
pub mod transport;
pub mod types;

pub use cache::{CacheStats, CachedInference, LruResponseCache, ResponseCache};
pub use client::{FAILURE_PREFIX, InferenceClient, InferenceFailure, RetryPolicy, is_failure_marker};
pub use transport::{GeminiTransport, Transport, TransportError, TransportResponse};
