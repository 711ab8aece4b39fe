//! Bramble: a recursive web content fuzzer
//!
//! This crate implements a web fuzzer that substitutes wordlist entries into a
//! parameterized request template, dispatches the resulting requests with
//! bounded concurrency, classifies responses against match and filter rules,
//! and optionally recurses into newly discovered directories.

pub mod config;
pub mod input;
pub mod job;
pub mod output;
pub mod runner;

use thiserror::Error;

/// Main error type for bramble operations
#[derive(Debug, Error)]
pub enum BrambleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] input::InputError),

    #[error("Runner error: {0}")]
    Runner(#[from] runner::RunnerError),

    #[error("Match rule error: {0}")]
    Match(#[from] job::MatchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid delay specification: {0}")]
    InvalidDelay(String),
}

/// Result type alias for bramble operations
pub type Result<T> = std::result::Result<T, BrambleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use job::{Job, Progress, QueueTarget};
pub use runner::{Request, Response};
