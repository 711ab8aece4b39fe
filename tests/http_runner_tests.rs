//! Integration tests for the HTTP runner
//!
//! These tests use wiremock to stand up a real HTTP server and exercise
//! request preparation, response collection, redirect handling, and a full
//! fuzzing run end-to-end.

use bramble::config::{
    CalibrationConfig, Config, FuzzerConfig, OutputConfig, RecursionConfig, RuleSet, SafetyConfig,
    TargetConfig, WordlistConfig,
};
use bramble::input::{InputMap, WordlistInput};
use bramble::job::Job;
use bramble::output::JsonFileOutput;
use bramble::runner::{HttpRunner, RunnerError, RunnerProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_config(url: &str) -> Config {
    Config {
        target: TargetConfig {
            url: url.to_string(),
            method: "GET".to_string(),
            headers: Default::default(),
            body: String::new(),
        },
        wordlists: vec![WordlistConfig {
            path: "unused.txt".to_string(),
            keyword: "FUZZ".to_string(),
        }],
        fuzzer: FuzzerConfig {
            threads: 2,
            timeout: 5,
            progress_frequency: 20,
            ..Default::default()
        },
        matchers: RuleSet {
            status: Some("200".to_string()),
            ..Default::default()
        },
        filters: RuleSet::default(),
        recursion: RecursionConfig::default(),
        safety: SafetyConfig::default(),
        calibration: CalibrationConfig::default(),
        output: OutputConfig {
            quiet: true,
            json_path: String::new(),
        },
        command_line: String::new(),
    }
}

fn fuzz_input(value: &str) -> InputMap {
    let mut input = InputMap::new();
    input.insert("FUZZ".to_string(), value.as_bytes().to_vec());
    input
}

#[tokio::test]
async fn test_execute_collects_response_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("hello world\nbye\n")
                .insert_header("Content-Type", "text/html"),
        )
        .mount(&server)
        .await;

    let config = http_config(&format!("{}/FUZZ", server.uri()));
    let runner = HttpRunner::new(&config, CancellationToken::new()).unwrap();

    let mut request = runner
        .prepare(&fuzz_input("admin"), &config.target.url)
        .unwrap();
    request.position = 7;
    let response = runner.execute(&mut request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.content_length, 16);
    assert_eq!(response.content_words, 3);
    assert_eq!(response.content_lines, 3);
    assert_eq!(response.content_type, "text/html");
    assert_eq!(response.position, 7);
    assert_eq!(response.request_url, format!("{}/admin", server.uri()));
}

#[tokio::test]
async fn test_redirects_are_reported_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dir"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/dir/"))
        .mount(&server)
        .await;

    let config = http_config(&format!("{}/FUZZ", server.uri()));
    let runner = HttpRunner::new(&config, CancellationToken::new()).unwrap();

    let mut request = runner
        .prepare(&fuzz_input("dir"), &config.target.url)
        .unwrap();
    let response = runner.execute(&mut request).await.unwrap();

    assert_eq!(response.status, 301);
    assert_eq!(response.redirect_location(false), "/dir/");
    assert_eq!(
        response.redirect_location(true),
        format!("{}/dir/", server.uri())
    );
}

#[tokio::test]
async fn test_keywords_substituted_in_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("X-Probe", "val-admin"))
        .and(body_string("user=admin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = http_config(&format!("{}/login", server.uri()));
    config.target.method = "POST".to_string();
    config
        .target
        .headers
        .insert("X-Probe".to_string(), "val-FUZZ".to_string());
    config.target.body = "user=FUZZ".to_string();
    let runner = HttpRunner::new(&config, CancellationToken::new()).unwrap();

    let mut request = runner
        .prepare(&fuzz_input("admin"), &config.target.url)
        .unwrap();
    let response = runner.execute(&mut request).await.unwrap();

    // The mock only matches when header and body were substituted
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_execute_aborts_on_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let config = http_config(&format!("{}/FUZZ", server.uri()));
    let cancel = CancellationToken::new();
    let runner = HttpRunner::new(&config, cancel.clone()).unwrap();

    let mut request = runner
        .prepare(&fuzz_input("slow"), &config.target.url)
        .unwrap();

    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    });

    let started = std::time::Instant::now();
    let result = runner.execute(&mut request).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(RunnerError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_full_fuzz_run_writes_json_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret area"))
        .mount(&server)
        .await;

    let config = http_config(&format!("{}/FUZZ", server.uri()));
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("results.json");

    let cancel = CancellationToken::new();
    let runner = Arc::new(HttpRunner::new(&config, cancel.clone()).unwrap());
    let output = Arc::new(JsonFileOutput::new(
        &json_path,
        "bramble test".to_string(),
        "cafebabe".to_string(),
    ));
    let input = Box::new(WordlistInput::from_entries(
        "FUZZ",
        vec![b"admin".to_vec(), b"backup".to_vec(), b"missing".to_vec()],
    ));

    let mut job = Job::new(config, input, runner, None, output, cancel).unwrap();
    let handle = job.handle();
    job.start().await;

    assert_eq!(handle.stats().dispatched, 3);
    assert_eq!(handle.stats().errors, 0);

    let content = std::fs::read_to_string(&json_path).unwrap();
    let document: serde_json::Value = serde_json::from_str(&content).unwrap();
    let results = document["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["input"]["FUZZ"], "admin");
    assert_eq!(results[0]["status"], 200);
    assert_eq!(results[0]["length"], 11);
}
