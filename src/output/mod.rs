//! Output handling for fuzzing runs
//!
//! This module handles:
//! - The provider trait the engine emits through
//! - Terminal output with live progress
//! - JSON results files for machine consumption

mod json;
mod stdout;
mod traits;

pub use json::JsonFileOutput;
pub use stdout::StdoutOutput;
pub use traits::{OutputError, OutputProvider, Progress};

use crate::runner::Response;
use std::sync::Arc;

/// Fans every output event out to several providers
///
/// The binary uses this to drive the terminal and a JSON results file from
/// the same run.
pub struct MultiOutput {
    outputs: Vec<Arc<dyn OutputProvider>>,
}

impl MultiOutput {
    pub fn new(outputs: Vec<Arc<dyn OutputProvider>>) -> Self {
        Self { outputs }
    }
}

impl OutputProvider for MultiOutput {
    fn banner(&self) {
        for output in &self.outputs {
            output.banner();
        }
    }

    fn progress(&self, progress: &Progress) {
        for output in &self.outputs {
            output.progress(progress);
        }
    }

    fn result(&self, response: &Response) {
        for output in &self.outputs {
            output.result(response);
        }
    }

    fn info(&self, message: &str) {
        for output in &self.outputs {
            output.info(message);
        }
    }

    fn warning(&self, message: &str) {
        for output in &self.outputs {
            output.warning(message);
        }
    }

    fn error(&self, message: &str) {
        for output in &self.outputs {
            output.error(message);
        }
    }

    fn reset(&self) {
        for output in &self.outputs {
            output.reset();
        }
    }

    fn cycle(&self) {
        for output in &self.outputs {
            output.cycle();
        }
    }

    fn finalize(&self) -> Result<(), OutputError> {
        let mut first_error = None;
        for output in &self.outputs {
            if let Err(e) = output.finalize() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
