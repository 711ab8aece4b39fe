//! reqwest-backed request runner
//!
//! Builds the HTTP client the engine fuzzes through. Redirects are never
//! followed: the engine classifies them via the `Location` header instead.

use crate::config::Config;
use crate::input::InputMap;
use crate::runner::{Request, Response, RunnerError, RunnerProvider};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// HTTP runner substituting wordlist keywords into a request template
pub struct HttpRunner {
    client: Client,
    method: String,
    header_template: Vec<(String, String)>,
    body_template: String,
    cancel: CancellationToken,
}

impl HttpRunner {
    /// Builds a runner from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration (method, headers, body, timeout)
    /// * `cancel` - Token that aborts in-flight requests on stop
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self, RunnerError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(config.fuzzer.timeout))
            .user_agent(concat!("bramble/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RunnerError::Build)?;
        Ok(Self::with_client(client, config, cancel))
    }

    /// Builds a replay runner that sends every request through a proxy
    ///
    /// Used to re-send matched requests so they show up in an intercepting
    /// proxy session.
    pub fn replay(config: &Config, cancel: CancellationToken) -> Result<Self, RunnerError> {
        let proxy = reqwest::Proxy::all(config.fuzzer.replay_proxy.as_str())
            .map_err(RunnerError::Build)?;
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(config.fuzzer.timeout))
            .user_agent(concat!("bramble/", env!("CARGO_PKG_VERSION")))
            .proxy(proxy)
            .build()
            .map_err(RunnerError::Build)?;
        Ok(Self::with_client(client, config, cancel))
    }

    fn with_client(client: Client, config: &Config, cancel: CancellationToken) -> Self {
        Self {
            client,
            method: config.target.method.clone(),
            header_template: config
                .target
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            body_template: config.target.body.clone(),
            cancel,
        }
    }

    async fn send(&self, request: &Request) -> Result<Response, RunnerError> {
        let method =
            Method::from_bytes(request.method.as_bytes()).map_err(|e| RunnerError::Prepare {
                field: "method".to_string(),
                message: e.to_string(),
            })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name: HeaderName = name.parse().map_err(|_| RunnerError::Prepare {
                field: "header".to_string(),
                message: format!("invalid header name: {name}"),
            })?;
            let value: HeaderValue = value.parse().map_err(|_| RunnerError::Prepare {
                field: "header".to_string(),
                message: "invalid header value".to_string(),
            })?;
            headers.insert(name, value);
        }

        let started = Instant::now();
        let response = self
            .client
            .request(method, request.url.as_str())
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|source| RunnerError::Http {
                url: request.url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let content_type = header_string(response.headers(), &CONTENT_TYPE);
        let redirect_location = header_string(response.headers(), &LOCATION);
        let body = response
            .bytes()
            .await
            .map_err(|source| RunnerError::Http {
                url: request.url.clone(),
                source,
            })?
            .to_vec();
        let duration = started.elapsed();

        Ok(Response::new(
            request,
            status,
            content_type,
            redirect_location,
            body,
            duration,
        ))
    }
}

#[async_trait]
impl RunnerProvider for HttpRunner {
    fn prepare(&self, input: &InputMap, base_url: &str) -> Result<Request, RunnerError> {
        let url = substitute(base_url, input);
        let headers = self
            .header_template
            .iter()
            .map(|(name, value)| (substitute(name, input), substitute(value, input)))
            .collect();
        let body = substitute(&self.body_template, input).into_bytes();

        Ok(Request {
            method: self.method.clone(),
            url,
            headers,
            body,
            position: 0,
            input: input.clone(),
        })
    }

    async fn execute(&self, request: &mut Request) -> Result<Response, RunnerError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(RunnerError::Cancelled),
            result = self.send(request) => result,
        }
    }
}

/// Replaces every keyword occurrence in a template with its input value
fn substitute(template: &str, input: &InputMap) -> String {
    let mut result = template.to_string();
    for (keyword, value) in input {
        if result.contains(keyword.as_str()) {
            result = result.replace(keyword.as_str(), &String::from_utf8_lossy(value));
        }
    }
    result
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, &str)]) -> InputMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_substitute_single_keyword() {
        let result = substitute("http://h/FUZZ", &input(&[("FUZZ", "admin")]));
        assert_eq!(result, "http://h/admin");
    }

    #[test]
    fn test_substitute_multiple_occurrences() {
        let result = substitute("FUZZ/FUZZ", &input(&[("FUZZ", "x")]));
        assert_eq!(result, "x/x");
    }

    #[test]
    fn test_substitute_multiple_keywords() {
        let result = substitute(
            "http://h/U/p?pass=P",
            &input(&[("U", "root"), ("P", "secret")]),
        );
        assert_eq!(result, "http://h/root/p?pass=secret");
    }

    #[test]
    fn test_substitute_no_keyword() {
        let result = substitute("http://h/static", &input(&[("FUZZ", "admin")]));
        assert_eq!(result, "http://h/static");
    }
}
