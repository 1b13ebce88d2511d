// src/lib.rs
// reqconflict - pairwise requirement conflict detection against an LLM endpoint

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod conflict;
pub mod error;
pub mod http;
pub mod llm;
pub mod table;

pub use error::{ConflictError, Result};
