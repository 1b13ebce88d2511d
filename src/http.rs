// src/http.rs
// Shared HTTP client for inference calls

use std::time::Duration;

/// Default request timeout for a single generateContent call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the shared HTTP client with the given request timeout.
///
/// Created once per run and handed to the transport. Uses connection
/// pooling internally, sized for the exhaustive worker pool.
pub fn create_shared_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
