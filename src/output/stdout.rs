//! Terminal output handler
//!
//! Prints matched results as they arrive and keeps a single self-overwriting
//! progress line on stderr, so results on stdout stay pipeable.

use crate::output::{OutputError, OutputProvider, Progress};
use crate::runner::Response;
use std::io::Write;

const BANNER: &str = r#"
        __                     __    __
       / /_  _________ _____ _/ /_  / /__
      / __ \/ ___/ __ `/ __ `/ __ \/ / _ \
     / /_/ / /  / /_/ / / / / / / / /  __/
    /_.___/_/   \__,_/_/ /_/_/ /_/_/\___/
"#;

/// Writes results and progress to the terminal
pub struct StdoutOutput {
    quiet: bool,
}

impl StdoutOutput {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Joins the input values of a response for display
    fn format_input(response: &Response) -> String {
        let mut values: Vec<String> = response
            .input
            .values()
            .map(|value| String::from_utf8_lossy(value).into_owned())
            .collect();
        values.sort();
        values.join(" / ")
    }

    fn clear_progress_line(&self) {
        if !self.quiet {
            eprint!("\r{:<100}\r", "");
        }
    }
}

impl OutputProvider for StdoutOutput {
    fn banner(&self) {
        if !self.quiet {
            eprintln!("{BANNER}");
            eprintln!("    v{}", env!("CARGO_PKG_VERSION"));
            eprintln!();
        }
    }

    fn progress(&self, progress: &Progress) {
        if self.quiet {
            return;
        }
        let duration = progress.started_at.elapsed();
        eprint!(
            "\r:: Progress: [{}/{}] :: Job [{}/{}] :: {:.0} req/sec :: Duration: [{}:{:02}] :: Errors: {} ::",
            progress.req_count,
            progress.req_total,
            progress.queue_pos,
            progress.queue_total,
            progress.req_sec,
            duration.as_secs() / 60,
            duration.as_secs() % 60,
            progress.error_count,
        );
        let _ = std::io::stderr().flush();
    }

    fn result(&self, response: &Response) {
        self.clear_progress_line();
        println!(
            "{:<24} [Status: {}, Size: {}, Words: {}, Lines: {}, Duration: {}ms]",
            Self::format_input(response),
            response.status,
            response.content_length,
            response.content_words,
            response.content_lines,
            response.duration.as_millis(),
        );
    }

    fn info(&self, message: &str) {
        self.clear_progress_line();
        eprintln!("[INFO] {message}");
    }

    fn warning(&self, message: &str) {
        self.clear_progress_line();
        eprintln!("[WARN] {message}");
    }

    fn error(&self, message: &str) {
        self.clear_progress_line();
        eprintln!("[ERR]  {message}");
    }

    fn reset(&self) {
        self.clear_progress_line();
    }

    fn cycle(&self) {
        self.clear_progress_line();
        if !self.quiet {
            eprintln!();
        }
    }

    fn finalize(&self) -> Result<(), OutputError> {
        self.clear_progress_line();
        if !self.quiet {
            eprintln!();
        }
        Ok(())
    }
}
