use crate::config::types::Config;
use crate::ConfigError;
use std::collections::HashSet;

/// Validates a parsed configuration
///
/// Checks that the target URL carries a substitution keyword, that the
/// concurrency and timing settings are sane, and that wordlist keywords
/// are unique.
///
/// # Arguments
///
/// * `config` - The configuration to validate
///
/// # Returns
///
/// * `Ok(())` - Configuration is valid
/// * `Err(ConfigError)` - A validation rule failed
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.target.url.is_empty() {
        return Err(ConfigError::Validation(
            "target url must not be empty".to_string(),
        ));
    }

    if config.wordlists.is_empty() {
        return Err(ConfigError::Validation(
            "at least one wordlist must be configured".to_string(),
        ));
    }

    // Every keyword must be unique, and at least one must appear somewhere
    // in the request template (URL, headers, or body).
    let mut keywords = HashSet::new();
    for wordlist in &config.wordlists {
        if wordlist.keyword.is_empty() {
            return Err(ConfigError::Validation(format!(
                "wordlist {} has an empty keyword",
                wordlist.path
            )));
        }
        if !keywords.insert(wordlist.keyword.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate wordlist keyword: {}",
                wordlist.keyword
            )));
        }
    }

    let template_has_keyword = config.wordlists.iter().any(|w| {
        config.target.url.contains(&w.keyword)
            || config.target.body.contains(&w.keyword)
            || config
                .target
                .headers
                .iter()
                .any(|(k, v)| k.contains(&w.keyword) || v.contains(&w.keyword))
    });
    if !template_has_keyword {
        return Err(ConfigError::Validation(
            "no wordlist keyword found in the request template".to_string(),
        ));
    }

    if config.fuzzer.threads == 0 {
        return Err(ConfigError::Validation(
            "threads must be at least 1".to_string(),
        ));
    }

    if config.fuzzer.progress_frequency == 0 {
        return Err(ConfigError::Validation(
            "progress-frequency must be at least 1ms".to_string(),
        ));
    }

    let delay = &config.fuzzer.delay;
    if delay.has_delay && (delay.min < 0.0 || delay.min > delay.max) {
        return Err(ConfigError::Validation(format!(
            "invalid delay range: {}-{}",
            delay.min, delay.max
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{Delay, TargetConfig, WordlistConfig};

    fn create_valid_config() -> Config {
        Config {
            target: TargetConfig {
                url: "http://example.com/FUZZ".to_string(),
                method: "GET".to_string(),
                headers: Default::default(),
                body: String::new(),
            },
            wordlists: vec![WordlistConfig {
                path: "words.txt".to_string(),
                keyword: "FUZZ".to_string(),
            }],
            fuzzer: Default::default(),
            matchers: Default::default(),
            filters: Default::default(),
            recursion: Default::default(),
            safety: Default::default(),
            calibration: Default::default(),
            output: Default::default(),
            command_line: String::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = create_valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut config = create_valid_config();
        config.target.url = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_wordlist_rejected() {
        let mut config = create_valid_config();
        config.wordlists.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_keyword_in_template_rejected() {
        let mut config = create_valid_config();
        config.target.url = "http://example.com/".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_keyword_in_body_accepted() {
        let mut config = create_valid_config();
        config.target.url = "http://example.com/login".to_string();
        config.target.body = "user=admin&pass=FUZZ".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_keyword_in_header_accepted() {
        let mut config = create_valid_config();
        config.target.url = "http://example.com/".to_string();
        config
            .target
            .headers
            .insert("X-Forwarded-For".to_string(), "FUZZ".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut config = create_valid_config();
        config.fuzzer.threads = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_keywords_rejected() {
        let mut config = create_valid_config();
        config.wordlists.push(WordlistConfig {
            path: "other.txt".to_string(),
            keyword: "FUZZ".to_string(),
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let mut config = create_valid_config();
        config.fuzzer.delay = Delay {
            has_delay: true,
            is_range: true,
            min: 2.0,
            max: 0.1,
        };
        assert!(validate(&config).is_err());
    }
}
