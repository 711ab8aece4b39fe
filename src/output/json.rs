//! JSON results file writer
//!
//! Collects matched responses for the whole run and writes a single JSON
//! document on finalize, carrying enough metadata to reproduce the run.

use crate::output::{OutputError, OutputProvider, Progress};
use crate::runner::Response;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Serialize)]
struct JsonDocument<'a> {
    commandline: &'a str,
    time: String,
    #[serde(rename = "config-hash")]
    config_hash: &'a str,
    results: &'a [JsonResult],
}

#[derive(Debug, Serialize)]
struct JsonResult {
    input: BTreeMap<String, String>,
    position: usize,
    status: u16,
    length: u64,
    words: u64,
    lines: u64,
    #[serde(rename = "content-type")]
    content_type: String,
    redirectlocation: String,
    #[serde(rename = "duration-ms")]
    duration_ms: u128,
    url: String,
}

impl JsonResult {
    fn from_response(response: &Response) -> Self {
        let input = response
            .input
            .iter()
            .map(|(keyword, value)| {
                (keyword.clone(), String::from_utf8_lossy(value).into_owned())
            })
            .collect();
        Self {
            input,
            position: response.position,
            status: response.status,
            length: response.content_length,
            words: response.content_words,
            lines: response.content_lines,
            content_type: response.content_type.clone(),
            redirectlocation: response.redirect_location(false),
            duration_ms: response.duration.as_millis(),
            url: response.request_url.clone(),
        }
    }
}

/// Accumulates results and writes them as one JSON file at run end
pub struct JsonFileOutput {
    path: PathBuf,
    command_line: String,
    config_hash: String,
    results: Mutex<Vec<JsonResult>>,
}

impl JsonFileOutput {
    /// # Arguments
    ///
    /// * `path` - Where the JSON document is written on finalize
    /// * `command_line` - The invocation recorded in the document
    /// * `config_hash` - Hash of the config file that drove the run
    pub fn new(path: impl Into<PathBuf>, command_line: String, config_hash: String) -> Self {
        Self {
            path: path.into(),
            command_line,
            config_hash,
            results: Mutex::new(Vec::new()),
        }
    }
}

impl OutputProvider for JsonFileOutput {
    fn banner(&self) {}

    fn progress(&self, _progress: &Progress) {}

    fn result(&self, response: &Response) {
        let mut results = self.results.lock().expect("results lock poisoned");
        results.push(JsonResult::from_response(response));
    }

    fn info(&self, _message: &str) {}

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn reset(&self) {}

    fn cycle(&self) {}

    fn finalize(&self) -> Result<(), OutputError> {
        let results = self.results.lock().expect("results lock poisoned");
        let document = JsonDocument {
            commandline: &self.command_line,
            time: chrono::Local::now().to_rfc3339(),
            config_hash: &self.config_hash,
            results: &results[..],
        };
        let encoded = serde_json::to_vec_pretty(&document)?;
        std::fs::write(&self.path, encoded)?;
        Ok(())
    }
}
