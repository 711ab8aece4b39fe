//! Configuration module for bramble
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use bramble::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Fuzzing with {} threads", config.fuzzer.threads);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CalibrationConfig, Config, Delay, FuzzerConfig, OutputConfig, RecursionConfig,
    RecursionStrategy, RuleSet, SafetyConfig, TargetConfig, WordlistConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
