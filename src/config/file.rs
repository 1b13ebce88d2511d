// src/config/file.rs
// File-based configuration from ~/.reqconflict/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level config structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FileConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
}

/// `[llm]` section - inference endpoint and retry policy
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LlmSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub max_retries: Option<u32>,
    pub backoff_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// `[analysis]` section - scheduler and cache sizing
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AnalysisSection {
    pub workers: Option<usize>,
    pub max_in_flight: Option<usize>,
    pub delay_ms: Option<u64>,
    pub cache_capacity: Option<usize>,
}

impl FileConfig {
    /// Load config from ~/.reqconflict/config.toml
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }
}

/// Per-user directory holding config.toml and .env
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reqconflict")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[llm]
model = "gemini-2.0-flash"
max_retries = 7

[analysis]
workers = 4
delay_ms = 250
"#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(config.llm.max_retries, Some(7));
        assert_eq!(config.analysis.workers, Some(4));
        assert_eq!(config.analysis.delay_ms, Some(250));
        assert!(config.analysis.max_in_flight.is_none());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.llm.endpoint.is_none());
        assert!(config.analysis.cache_capacity.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load_from(&dir.path().join("absent.toml"));
        assert!(config.llm.model.is_none());
    }

    #[test]
    fn test_load_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();
        let config = FileConfig::load_from(&path);
        assert!(config.llm.model.is_none());
    }
}
