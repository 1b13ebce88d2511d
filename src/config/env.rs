// src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use super::file::FileConfig;
use crate::error::{ConflictError, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base URL for the Gemini generateContent API
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Default model used for conflict classification
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_SECS: u64 = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;
pub const DEFAULT_DELAY_MS: u64 = 1000;
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// API keys loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Gemini/Google API key (GEMINI_API_KEY or GOOGLE_API_KEY)
    pub gemini: Option<String>,
}

impl ApiKeys {
    /// Load API keys from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let read_key = |name: &str| lookup(name).filter(|k| !k.trim().is_empty());
        let gemini = read_key("GEMINI_API_KEY").or_else(|| read_key("GOOGLE_API_KEY"));

        if gemini.is_some() {
            debug!("Gemini API key loaded");
        } else {
            warn!("No GEMINI_API_KEY configured - inference will be unavailable");
        }

        Self { gemini }
    }

    /// The API key, or a configuration error when absent
    pub fn require_gemini(&self) -> Result<String> {
        self.gemini.clone().ok_or_else(|| {
            ConflictError::Config(
                "GEMINI_API_KEY is not set (also checked GOOGLE_API_KEY)".to_string(),
            )
        })
    }
}

/// Inference endpoint and retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Base URL, model is appended as `{endpoint}/{model}:generateContent`
    pub endpoint: String,
    pub model: String,
    /// Total attempts for retryable failures
    pub max_retries: u32,
    /// First backoff delay, doubled after each retry
    pub base_backoff: Duration,
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Scheduler sizing and pacing
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Spawned tasks kept in flight by the exhaustive scheduler
    pub workers: usize,
    /// Admission gate permits around the network call
    pub max_in_flight: usize,
    /// Pause between calls in sequential modes
    pub request_delay: Duration,
    pub cache_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            request_delay: Duration::from_millis(DEFAULT_DELAY_MS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Configuration validation result
#[derive(Debug)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for ConfigValidation {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidation {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Format as a human-readable report
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            for err in &self.errors {
                lines.push(format!("  - {}", err));
            }
        }

        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            for warn in &self.warnings {
                lines.push(format!("  - {}", warn));
            }
        }

        if lines.is_empty() {
            "Configuration OK".to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Environment configuration - all env vars in one place.
/// Precedence: env var > config.toml > built-in default.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub api_keys: ApiKeys,
    pub inference: InferenceConfig,
    pub analysis: AnalysisConfig,
}

impl EnvConfig {
    /// Load all configuration (call once at startup)
    pub fn load() -> Self {
        info!("Loading environment configuration");
        Self::from_sources(&FileConfig::load(), &|name| std::env::var(name).ok())
    }

    /// Merge a parsed config file with an env-style lookup
    pub fn from_sources(file: &FileConfig, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let defaults_inf = InferenceConfig::default();
        let defaults_an = AnalysisConfig::default();

        let inference = InferenceConfig {
            endpoint: lookup("REQCONFLICT_ENDPOINT")
                .filter(|s| !s.is_empty())
                .or_else(|| file.llm.endpoint.clone())
                .unwrap_or(defaults_inf.endpoint),
            model: lookup("REQCONFLICT_MODEL")
                .filter(|s| !s.is_empty())
                .or_else(|| file.llm.model.clone())
                .unwrap_or(defaults_inf.model),
            max_retries: parse_var(lookup, "REQCONFLICT_MAX_RETRIES")
                .or(file.llm.max_retries)
                .unwrap_or(defaults_inf.max_retries),
            base_backoff: parse_var(lookup, "REQCONFLICT_BACKOFF_SECS")
                .or(file.llm.backoff_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults_inf.base_backoff),
            timeout: parse_var(lookup, "REQCONFLICT_TIMEOUT_SECS")
                .or(file.llm.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults_inf.timeout),
        };

        let analysis = AnalysisConfig {
            workers: parse_var(lookup, "REQCONFLICT_WORKERS")
                .or(file.analysis.workers)
                .unwrap_or(defaults_an.workers),
            max_in_flight: parse_var(lookup, "REQCONFLICT_MAX_IN_FLIGHT")
                .or(file.analysis.max_in_flight)
                .unwrap_or(defaults_an.max_in_flight),
            request_delay: parse_var(lookup, "REQCONFLICT_DELAY_MS")
                .or(file.analysis.delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults_an.request_delay),
            cache_capacity: parse_var(lookup, "REQCONFLICT_CACHE_CAPACITY")
                .or(file.analysis.cache_capacity)
                .unwrap_or(defaults_an.cache_capacity),
        };

        Self {
            api_keys: ApiKeys::from_lookup(lookup),
            inference,
            analysis,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        if self.api_keys.gemini.is_none() {
            validation.add_error("No API key configured. Set GEMINI_API_KEY.");
        }
        if self.inference.max_retries == 0 {
            validation.add_error("REQCONFLICT_MAX_RETRIES must be at least 1");
        }
        if self.analysis.workers == 0 {
            validation.add_error("REQCONFLICT_WORKERS must be at least 1");
        }
        if self.analysis.max_in_flight == 0 {
            validation.add_error("REQCONFLICT_MAX_IN_FLIGHT must be at least 1");
        }
        if self.analysis.cache_capacity == 0 {
            validation.add_error("REQCONFLICT_CACHE_CAPACITY must be at least 1");
        }
        if self.analysis.max_in_flight > self.analysis.workers {
            validation.add_warning(format!(
                "max_in_flight ({}) exceeds workers ({}); only {} calls can run at once",
                self.analysis.max_in_flight, self.analysis.workers, self.analysis.workers
            ));
        }
        if self.analysis.request_delay.is_zero() {
            validation.add_warning("Request delay is 0 - sequential modes may hit rate limits");
        }
        if !self.inference.endpoint.starts_with("http") {
            validation.add_error(format!(
                "Endpoint '{}' is not an http(s) URL",
                self.inference.endpoint
            ));
        }

        validation
    }
}

fn parse_var<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable value");
            None
        }
    }
}
