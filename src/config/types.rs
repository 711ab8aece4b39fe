use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Main configuration structure for bramble
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,

    #[serde(default, rename = "wordlist")]
    pub wordlists: Vec<WordlistConfig>,

    #[serde(default)]
    pub fuzzer: FuzzerConfig,

    #[serde(default)]
    pub matchers: RuleSet,

    #[serde(default)]
    pub filters: RuleSet,

    #[serde(default)]
    pub recursion: RecursionConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// The command line that started this run, recorded in JSON output.
    /// Filled in by the binary, never read from the config file.
    #[serde(skip)]
    pub command_line: String,
}

/// Request template configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// The URL template; must contain at least one wordlist keyword
    pub url: String,

    /// HTTP method for fuzzed requests
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers; values may contain wordlist keywords
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body; may contain wordlist keywords
    #[serde(default)]
    pub body: String,
}

/// A single wordlist bound to a substitution keyword
#[derive(Debug, Clone, Deserialize)]
pub struct WordlistConfig {
    /// Path to the wordlist file, one entry per line
    pub path: String,

    /// The placeholder token this wordlist substitutes
    #[serde(default = "default_keyword")]
    pub keyword: String,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FuzzerConfig {
    /// Number of concurrent worker tasks
    pub threads: usize,

    /// Inter-request delay, either a fixed value ("0.4") or a range ("0.1-2.0"),
    /// in seconds
    #[serde(deserialize_with = "delay_from_str")]
    pub delay: Delay,

    /// Target request rate in requests per second (0 = unlimited)
    pub rate: u64,

    /// Milliseconds between progress updates
    #[serde(rename = "progress-frequency")]
    pub progress_frequency: u64,

    /// Maximum running time for the entire process in seconds (0 = none)
    #[serde(rename = "max-time")]
    pub max_time: u64,

    /// Maximum running time per queued target in seconds (0 = none)
    #[serde(rename = "max-time-target")]
    pub max_time_target: u64,

    /// HTTP request timeout in seconds
    pub timeout: u64,

    /// Proxy URL through which matched requests are replayed (empty = disabled)
    #[serde(rename = "replay-proxy")]
    pub replay_proxy: String,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            threads: 40,
            delay: Delay::default(),
            rate: 0,
            progress_frequency: 125,
            max_time: 0,
            max_time_target: 0,
            timeout: 10,
            replay_proxy: String::new(),
        }
    }
}

/// Parsed inter-request delay specification
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Delay {
    pub has_delay: bool,
    pub is_range: bool,
    /// Seconds; the fixed delay, or the lower bound of the range
    pub min: f64,
    /// Seconds; the upper bound of the range
    pub max: f64,
}

impl FromStr for Delay {
    type Err = String;

    /// Parses a delay from "", "0.4", or "0.1-2.0" (seconds)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Delay::default());
        }
        if let Some((min, max)) = s.split_once('-') {
            let min: f64 = min
                .trim()
                .parse()
                .map_err(|_| format!("invalid delay range start: {min:?}"))?;
            let max: f64 = max
                .trim()
                .parse()
                .map_err(|_| format!("invalid delay range end: {max:?}"))?;
            Ok(Delay {
                has_delay: true,
                is_range: true,
                min,
                max,
            })
        } else {
            let value: f64 = s.parse().map_err(|_| format!("invalid delay: {s:?}"))?;
            Ok(Delay {
                has_delay: true,
                is_range: false,
                min: value,
                max: value,
            })
        }
    }
}

fn delay_from_str<'de, D>(deserializer: D) -> Result<Delay, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Response match or filter rules; each field is an expression over one
/// response attribute. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSet {
    /// Status codes: comma-separated codes and ranges, or "all"
    pub status: Option<String>,

    /// Response sizes in bytes: comma-separated values and ranges
    pub size: Option<String>,

    /// Response word counts: comma-separated values and ranges
    pub words: Option<String>,

    /// Response line counts: comma-separated values and ranges
    pub lines: Option<String>,

    /// Regular expression matched against the response body
    pub regex: Option<String>,
}

impl RuleSet {
    /// Returns true if no rule fields are set
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.size.is_none()
            && self.words.is_none()
            && self.lines.is_none()
            && self.regex.is_none()
    }
}

/// Recursive discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecursionConfig {
    /// Whether newly found directories are queued for another wordlist pass
    pub enabled: bool,

    /// When to extend the frontier: on directory redirects or on every match
    pub strategy: RecursionStrategy,

    /// Maximum recursion depth (0 = unbounded)
    pub depth: u32,
}

impl Default for RecursionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strategy: RecursionStrategy::Default,
            depth: 0,
        }
    }
}

/// Strategy deciding which responses extend the recursion frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecursionStrategy {
    /// Recurse only on responses that redirect to their own trailing-slash form
    Default,
    /// Recurse on every matched response
    Greedy,
}

/// Adaptive stop conditions
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Stop the run when almost all responses are 403 Forbidden
    #[serde(rename = "stop-on-403")]
    pub stop_on_403: bool,

    /// Stop the run when requests keep erroring with no successes in between
    #[serde(rename = "stop-on-errors")]
    pub stop_on_errors: bool,

    /// All of the above, plus stop on an unusual amount of 429 responses
    #[serde(rename = "stop-on-all")]
    pub stop_on_all: bool,
}

/// Filter auto-calibration configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Whether to probe the target with synthetic inputs before fuzzing
    /// and derive filters from the baseline responses
    pub auto: bool,

    /// Custom calibration inputs; when empty, built-in probes are used
    pub strings: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Suppress the banner and progress output
    pub quiet: bool,

    /// Path for the JSON results file (empty = terminal output only)
    #[serde(rename = "json-path")]
    pub json_path: String,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_keyword() -> String {
    "FUZZ".to_string()
}
