//! Output provider trait and progress reporting types

use crate::runner::Response;
use std::time::Instant;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A snapshot of run progress, emitted periodically and after each result
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// When the current target started
    pub started_at: Instant,

    /// Inputs dispatched so far for the current target
    pub req_count: usize,

    /// Total inputs for the current target
    pub req_total: usize,

    /// Observed request rate in requests per second
    pub req_sec: f64,

    /// Position of the current target in the queue (1-based)
    pub queue_pos: usize,

    /// Total number of queued targets, including completed ones
    pub queue_total: usize,

    /// Errors recorded so far
    pub error_count: usize,
}

/// Sink for everything the engine reports
///
/// Implementations must be thread-safe: workers emit results and errors
/// concurrently with the progress monitor.
pub trait OutputProvider: Send + Sync {
    /// Prints the startup banner
    fn banner(&self);

    /// Updates the live progress display
    fn progress(&self, progress: &Progress);

    /// Emits a matched response
    fn result(&self, response: &Response);

    /// Emits an informational line
    fn info(&self, message: &str);

    /// Emits a warning line
    fn warning(&self, message: &str);

    /// Emits an error line
    fn error(&self, message: &str);

    /// Clears per-target display state before re-running the same target
    fn reset(&self);

    /// Marks the transition to the next queued target
    fn cycle(&self);

    /// Flushes and closes the output; called exactly once at run end
    fn finalize(&self) -> Result<(), OutputError>;
}
