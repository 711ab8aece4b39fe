//! HTTP request construction and execution
//!
//! This module defines the request/response model the engine classifies, the
//! provider trait that abstracts over HTTP execution, and the reqwest-backed
//! implementation used by the binary.

mod http;

pub use http::HttpRunner;

use crate::input::InputMap;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors from preparing or executing requests
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Invalid request {field}: {message}")]
    Prepare { field: String, message: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request failed: {0}")]
    Failed(String),

    #[error("Request cancelled")]
    Cancelled,
}

/// Prepares and executes fuzzed HTTP requests
///
/// `prepare` substitutes the input map into the request template rooted at
/// `base_url`; `execute` performs the request. Implementations must be safe
/// to share across worker tasks.
#[async_trait]
pub trait RunnerProvider: Send + Sync {
    /// Builds a request by substituting keywords into the template
    fn prepare(&self, input: &InputMap, base_url: &str) -> Result<Request, RunnerError>;

    /// Executes a prepared request and collects the response
    async fn execute(&self, request: &mut Request) -> Result<Response, RunnerError>;
}

/// A prepared request with all keywords substituted
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Wordlist position of the input this request was built from
    pub position: usize,
    /// The input map the request was built from, carried through to the response
    pub input: InputMap,
}

/// An executed response with the attributes the engine classifies on
pub struct Response {
    pub status: u16,
    pub content_length: u64,
    pub content_words: u64,
    pub content_lines: u64,
    pub content_type: String,
    pub request_url: String,
    pub duration: Duration,
    pub input: InputMap,
    pub position: usize,
    redirect_location: String,
    body: Vec<u8>,
    released: bool,
    on_release: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Response {
    /// Builds a response from an executed request and the received parts
    ///
    /// Word and line counts are derived from the body here, so they stay
    /// available after the body has been released.
    pub fn new(
        request: &Request,
        status: u16,
        content_type: String,
        redirect_location: String,
        body: Vec<u8>,
        duration: Duration,
    ) -> Self {
        Self {
            status,
            content_length: body.len() as u64,
            content_words: count_words(&body),
            content_lines: count_lines(&body),
            content_type,
            request_url: request.url.clone(),
            duration,
            input: request.input.clone(),
            position: request.position,
            redirect_location,
            body,
            released: false,
            on_release: None,
        }
    }

    /// Installs a hook fired when the engine releases the body, letting
    /// pooling runners reclaim their buffers
    pub fn with_release_hook(mut self, hook: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.on_release = Some(hook);
        self
    }

    /// The response body; empty after `release_body`
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the redirect target of this response
    ///
    /// With `absolute` set, a relative `Location` header is resolved against
    /// the request URL. Returns an empty string when the response did not
    /// redirect, or when the location cannot be resolved.
    pub fn redirect_location(&self, absolute: bool) -> String {
        if !absolute || self.redirect_location.is_empty() {
            return self.redirect_location.clone();
        }
        match Url::parse(&self.request_url) {
            Ok(base) => base
                .join(&self.redirect_location)
                .map(|resolved| resolved.to_string())
                .unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    /// Releases the body memory once the engine is done classifying
    ///
    /// The derived counts and redirect metadata stay valid. Fires the
    /// release hook, if any, on the first call.
    pub fn release_body(&mut self) {
        self.body = Vec::new();
        if !self.released {
            self.released = true;
            if let Some(hook) = self.on_release.take() {
                hook();
            }
        }
    }

    /// Whether `release_body` has been called
    pub fn body_released(&self) -> bool {
        self.released
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_words", &self.content_words)
            .field("content_lines", &self.content_lines)
            .field("request_url", &self.request_url)
            .field("redirect_location", &self.redirect_location)
            .field("position", &self.position)
            .field("released", &self.released)
            .finish()
    }
}

fn count_words(body: &[u8]) -> u64 {
    body.split(|b| b.is_ascii_whitespace())
        .filter(|chunk| !chunk.is_empty())
        .count() as u64
}

fn count_lines(body: &[u8]) -> u64 {
    if body.is_empty() {
        return 0;
    }
    body.iter().filter(|&&b| b == b'\n').count() as u64 + 1
}
