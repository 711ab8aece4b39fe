//! Input providers for wordlist iteration
//!
//! This module defines the trait the engine pulls fuzz inputs from, and the
//! file-backed wordlist implementations:
//! - A single wordlist bound to one keyword
//! - A cartesian product over several wordlists for multi-keyword templates

mod wordlist;

pub use wordlist::{ProductInput, WordlistInput};

use std::collections::HashMap;
use thiserror::Error;

/// One fuzz input: keyword to substituted bytes
pub type InputMap = HashMap<String, Vec<u8>>;

/// Errors from loading input sources
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read wordlist {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Wordlist {0} contains no entries")]
    Empty(String),
}

/// Source of fuzz inputs, iterated once per queued target
///
/// The engine drives the cursor with `next()` and snapshots `value()` and
/// `position()` before handing them to a worker. `reset()` rewinds the cursor
/// so the same provider can serve every queued target.
pub trait InputProvider: Send + Sync {
    /// Rewinds the cursor to the start
    fn reset(&mut self);

    /// Advances the cursor; returns false when the input is exhausted
    fn next(&mut self) -> bool;

    /// Returns the input at the current cursor position
    fn value(&self) -> InputMap;

    /// Returns the current cursor position, starting at 0
    fn position(&self) -> usize;

    /// Returns the total number of inputs this provider yields
    fn total(&self) -> usize;
}
