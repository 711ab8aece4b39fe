//! Response classification
//!
//! Matchers select candidate responses and filters reject candidates, in
//! that order: a response is emitted when at least one matcher accepts it
//! and no filter rejects it. Predicate evaluation errors are swallowed and
//! treated as "no match", so a single bad rule cannot abort a run.

use crate::config::RuleSet;
use crate::runner::Response;
use regex::Regex;
use thiserror::Error;

/// Matcher applied when the configuration defines none
const DEFAULT_MATCH_STATUS: &str = "200-299,301,302,307,401,403,405,500";

/// Errors from compiling or evaluating match rules
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid {field} specification: {spec:?}")]
    InvalidSpec { field: &'static str, spec: String },

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

/// A predicate over one response attribute
pub trait ResponsePredicate: Send + Sync {
    fn evaluate(&self, response: &Response) -> Result<bool, MatchError>;
}

/// An inclusive numeric range parsed from "a" or "a-b"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueRange {
    min: u64,
    max: u64,
}

impl ValueRange {
    fn contains(&self, value: u64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Parses "200,301-302,404" into ranges
fn parse_ranges(field: &'static str, spec: &str) -> Result<Vec<ValueRange>, MatchError> {
    let invalid = || MatchError::InvalidSpec {
        field,
        spec: spec.to_string(),
    };
    let mut ranges = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid());
        }
        let range = if let Some((min, max)) = part.split_once('-') {
            let min = min.trim().parse().map_err(|_| invalid())?;
            let max = max.trim().parse().map_err(|_| invalid())?;
            if min > max {
                return Err(invalid());
            }
            ValueRange { min, max }
        } else {
            let value = part.parse().map_err(|_| invalid())?;
            ValueRange {
                min: value,
                max: value,
            }
        };
        ranges.push(range);
    }
    Ok(ranges)
}

/// Matches on the HTTP status code; "all" accepts everything
pub struct StatusPredicate {
    ranges: Vec<ValueRange>,
    all: bool,
}

impl StatusPredicate {
    pub fn from_spec(spec: &str) -> Result<Self, MatchError> {
        if spec.trim() == "all" {
            return Ok(Self {
                ranges: Vec::new(),
                all: true,
            });
        }
        Ok(Self {
            ranges: parse_ranges("status", spec)?,
            all: false,
        })
    }
}

impl ResponsePredicate for StatusPredicate {
    fn evaluate(&self, response: &Response) -> Result<bool, MatchError> {
        if self.all {
            return Ok(true);
        }
        let status = response.status as u64;
        Ok(self.ranges.iter().any(|range| range.contains(status)))
    }
}

/// Matches on the response size in bytes
pub struct SizePredicate {
    ranges: Vec<ValueRange>,
}

impl SizePredicate {
    pub fn from_spec(spec: &str) -> Result<Self, MatchError> {
        Ok(Self {
            ranges: parse_ranges("size", spec)?,
        })
    }

    pub fn exact(size: u64) -> Self {
        Self {
            ranges: vec![ValueRange {
                min: size,
                max: size,
            }],
        }
    }
}

impl ResponsePredicate for SizePredicate {
    fn evaluate(&self, response: &Response) -> Result<bool, MatchError> {
        Ok(self
            .ranges
            .iter()
            .any(|range| range.contains(response.content_length)))
    }
}

/// Matches on the response word count
pub struct WordCountPredicate {
    ranges: Vec<ValueRange>,
}

impl WordCountPredicate {
    pub fn from_spec(spec: &str) -> Result<Self, MatchError> {
        Ok(Self {
            ranges: parse_ranges("words", spec)?,
        })
    }

    pub fn exact(words: u64) -> Self {
        Self {
            ranges: vec![ValueRange {
                min: words,
                max: words,
            }],
        }
    }
}

impl ResponsePredicate for WordCountPredicate {
    fn evaluate(&self, response: &Response) -> Result<bool, MatchError> {
        Ok(self
            .ranges
            .iter()
            .any(|range| range.contains(response.content_words)))
    }
}

/// Matches on the response line count
pub struct LineCountPredicate {
    ranges: Vec<ValueRange>,
}

impl LineCountPredicate {
    pub fn from_spec(spec: &str) -> Result<Self, MatchError> {
        Ok(Self {
            ranges: parse_ranges("lines", spec)?,
        })
    }

    pub fn exact(lines: u64) -> Self {
        Self {
            ranges: vec![ValueRange {
                min: lines,
                max: lines,
            }],
        }
    }
}

impl ResponsePredicate for LineCountPredicate {
    fn evaluate(&self, response: &Response) -> Result<bool, MatchError> {
        Ok(self
            .ranges
            .iter()
            .any(|range| range.contains(response.content_lines)))
    }
}

/// Matches a regular expression against the response body
pub struct RegexPredicate {
    regex: Regex,
}

impl RegexPredicate {
    pub fn from_spec(spec: &str) -> Result<Self, MatchError> {
        Ok(Self {
            regex: Regex::new(spec)?,
        })
    }
}

impl ResponsePredicate for RegexPredicate {
    fn evaluate(&self, response: &Response) -> Result<bool, MatchError> {
        let body = String::from_utf8_lossy(response.body());
        Ok(self.regex.is_match(&body))
    }
}

fn build_predicates(rules: &RuleSet) -> Result<Vec<Box<dyn ResponsePredicate>>, MatchError> {
    let mut predicates: Vec<Box<dyn ResponsePredicate>> = Vec::new();
    if let Some(spec) = &rules.status {
        predicates.push(Box::new(StatusPredicate::from_spec(spec)?));
    }
    if let Some(spec) = &rules.size {
        predicates.push(Box::new(SizePredicate::from_spec(spec)?));
    }
    if let Some(spec) = &rules.words {
        predicates.push(Box::new(WordCountPredicate::from_spec(spec)?));
    }
    if let Some(spec) = &rules.lines {
        predicates.push(Box::new(LineCountPredicate::from_spec(spec)?));
    }
    if let Some(spec) = &rules.regex {
        predicates.push(Box::new(RegexPredicate::from_spec(spec)?));
    }
    Ok(predicates)
}

/// Ordered matcher/filter evaluation over responses
///
/// Matchers are disjunctive: any single accepting matcher makes the response
/// a candidate. Filters take precedence over matchers: any single accepting
/// filter rejects a candidate.
pub struct MatchEngine {
    matchers: Vec<Box<dyn ResponsePredicate>>,
    filters: Vec<Box<dyn ResponsePredicate>>,
}

impl MatchEngine {
    /// Compiles the configured rule sets
    ///
    /// When no matchers are configured, a default status matcher is used so
    /// an empty configuration still reports interesting responses.
    pub fn from_rules(matchers: &RuleSet, filters: &RuleSet) -> Result<Self, MatchError> {
        let mut compiled_matchers = build_predicates(matchers)?;
        if compiled_matchers.is_empty() {
            compiled_matchers.push(Box::new(StatusPredicate::from_spec(DEFAULT_MATCH_STATUS)?));
        }
        Ok(Self {
            matchers: compiled_matchers,
            filters: build_predicates(filters)?,
        })
    }

    /// Adds a filter after compilation; used by auto-calibration
    pub fn add_filter(&mut self, filter: Box<dyn ResponsePredicate>) {
        self.filters.push(filter);
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Classifies a response
    ///
    /// Evaluation is pure: the same response always yields the same verdict.
    /// Predicate errors are treated as "no match".
    pub fn is_match(&self, response: &Response) -> bool {
        let mut matched = false;
        for matcher in &self.matchers {
            if matcher.evaluate(response).unwrap_or(false) {
                matched = true;
            }
        }
        if !matched {
            return false;
        }
        for filter in &self.filters {
            if filter.evaluate(response).unwrap_or(false) {
                return false;
            }
        }
        true
    }
}

/// Derives auto-calibration filters from baseline responses
///
/// When all baseline probes share a single response size, that size is
/// filtered; failing that, a shared word count, then a shared line count.
/// Baselines with nothing in common produce no filters.
pub fn calibration_filters(responses: &[Response]) -> Vec<Box<dyn ResponsePredicate>> {
    let mut filters: Vec<Box<dyn ResponsePredicate>> = Vec::new();
    if responses.is_empty() {
        return filters;
    }

    let distinct = |values: Vec<u64>| -> Option<u64> {
        let first = values[0];
        values.iter().all(|&v| v == first).then_some(first)
    };

    let sizes: Vec<u64> = responses.iter().map(|r| r.content_length).collect();
    let words: Vec<u64> = responses.iter().map(|r| r.content_words).collect();
    let lines: Vec<u64> = responses.iter().map(|r| r.content_lines).collect();

    if let Some(size) = distinct(sizes) {
        filters.push(Box::new(SizePredicate::exact(size)));
    } else if let Some(words) = distinct(words) {
        filters.push(Box::new(WordCountPredicate::exact(words)));
    } else if let Some(lines) = distinct(lines) {
        filters.push(Box::new(LineCountPredicate::exact(lines)));
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputMap;
    use crate::runner::Request;
    use std::time::Duration;

    fn response(status: u16, body: &[u8]) -> Response {
        let request = Request {
            method: "GET".to_string(),
            url: "http://h/x".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            position: 0,
            input: InputMap::new(),
        };
        Response::new(
            &request,
            status,
            String::new(),
            String::new(),
            body.to_vec(),
            Duration::from_millis(1),
        )
    }

    fn rules(status: Option<&str>, size: Option<&str>) -> RuleSet {
        RuleSet {
            status: status.map(String::from),
            size: size.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_ranges() {
        let ranges = parse_ranges("status", "200,301-303,404").unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(ranges[0].contains(200));
        assert!(ranges[1].contains(302));
        assert!(!ranges[1].contains(304));
        assert!(ranges[2].contains(404));
    }

    #[test]
    fn test_parse_ranges_rejects_garbage() {
        assert!(parse_ranges("status", "abc").is_err());
        assert!(parse_ranges("status", "200,,404").is_err());
        assert!(parse_ranges("status", "300-200").is_err());
    }

    #[test]
    fn test_status_all() {
        let predicate = StatusPredicate::from_spec("all").unwrap();
        assert!(predicate.evaluate(&response(999, b"")).unwrap());
    }

    #[test]
    fn test_regex_predicate() {
        let predicate = RegexPredicate::from_spec("admin.*panel").unwrap();
        assert!(predicate
            .evaluate(&response(200, b"the admin control panel"))
            .unwrap());
        assert!(!predicate.evaluate(&response(200, b"nothing here")).unwrap());
    }

    #[test]
    fn test_match_requires_a_matcher() {
        let engine = MatchEngine::from_rules(&rules(Some("200"), None), &RuleSet::default())
            .unwrap();
        assert!(engine.is_match(&response(200, b"hit")));
        assert!(!engine.is_match(&response(404, b"miss")));
    }

    #[test]
    fn test_matchers_are_disjunctive() {
        let engine = MatchEngine::from_rules(
            &RuleSet {
                status: Some("500".to_string()),
                size: Some("4".to_string()),
                ..Default::default()
            },
            &RuleSet::default(),
        )
        .unwrap();
        // Status does not match but size does
        assert!(engine.is_match(&response(200, b"abcd")));
    }

    #[test]
    fn test_filters_take_precedence() {
        let engine =
            MatchEngine::from_rules(&rules(Some("200"), None), &rules(None, Some("4"))).unwrap();
        assert!(!engine.is_match(&response(200, b"abcd")));
        assert!(engine.is_match(&response(200, b"abcde")));
    }

    #[test]
    fn test_default_matcher_applies_when_unconfigured() {
        let engine = MatchEngine::from_rules(&RuleSet::default(), &RuleSet::default()).unwrap();
        assert!(engine.is_match(&response(200, b"")));
        assert!(engine.is_match(&response(301, b"")));
        assert!(!engine.is_match(&response(404, b"")));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let engine = MatchEngine::from_rules(&rules(Some("200"), None), &RuleSet::default())
            .unwrap();
        let resp = response(200, b"stable");
        let first = engine.is_match(&resp);
        let second = engine.is_match(&resp);
        assert_eq!(first, second);
    }

    #[test]
    fn test_calibration_filters_shared_size() {
        let responses = vec![response(200, b"same body"), response(200, b"diff body")];
        let filters = calibration_filters(&responses);
        assert_eq!(filters.len(), 1);
        // Both baselines are 9 bytes, so size 9 is filtered
        assert!(filters[0].evaluate(&response(200, b"nine char")).unwrap());
        assert!(!filters[0].evaluate(&response(200, b"ten chars!")).unwrap());
    }

    #[test]
    fn test_calibration_filters_fall_back_to_lines() {
        let responses = vec![
            response(200, b"one two three"),
            response(200, b"four five six six"),
        ];
        // Sizes differ (13 vs 17) and word counts differ (3 vs 4): sizes and
        // words disagree, lines agree (1), so a line filter is produced.
        let filters = calibration_filters(&responses);
        assert_eq!(filters.len(), 1);
        assert!(filters[0].evaluate(&response(200, b"single line")).unwrap());
        assert!(!filters[0]
            .evaluate(&response(200, b"two\nlines"))
            .unwrap());
    }

    #[test]
    fn test_calibration_with_no_baselines() {
        assert!(calibration_filters(&[]).is_empty());
    }
}
