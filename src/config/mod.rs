// src/config/mod.rs
// Configuration and shared constants

pub mod env;
pub mod file;

pub use env::{AnalysisConfig, ApiKeys, ConfigValidation, EnvConfig, InferenceConfig};
pub use file::FileConfig;
