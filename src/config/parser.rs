use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs against the same store can be matched to the
/// configuration that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r##"
[site]
url = "https://jobs.example.com/search"

[filter]
option-selector = "#region-filter-7"
label = "Oregon"

[pagination]
max-retries = 5
retry-delay-ms = 100

[pagination.next-link]
selector = "a.next"
ready-timeout-ms = 1000
advance-timeout-ms = 2000

[output]
directory = "/tmp/crawl"
file-prefix = "Example"
"##;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.url, "https://jobs.example.com/search");
        assert_eq!(config.filter.label, "Oregon");
        assert_eq!(config.pagination.max_retries, 5);
        assert_eq!(config.pagination.next_link.selector, "a.next");
        assert_eq!(config.output.file_prefix, "Example");
    }

    #[test]
    fn test_empty_config_uses_site_defaults() {
        let config = parse_config("").unwrap();

        assert_eq!(config.site.results_selector, "#search-results");
        assert_eq!(config.filter.toggle_selector, "#region-toggle");
        assert_eq!(config.pagination.max_retries, 3);
        assert_eq!(config.pagination.retry_delay_ms, 2000);
        assert_eq!(config.pagination.max_consecutive_failures, 2);
        assert_eq!(config.crawler.page_delay_ms, 1000);
        assert!(!config.filter.allow_unchanged_count);
    }

    #[test]
    fn test_partial_strategy_table_keeps_its_defaults() {
        let config = parse_config(
            r#"
[pagination.expand-in-place]
ready-timeout-ms = 20
advance-timeout-ms = 30

[pagination.next-link]
advance-timeout-ms = 40
"#,
        )
        .unwrap();

        let expand = &config.pagination.expand_in_place;
        assert_eq!(expand.selector, "button.btn-learn-more.pagination-view-more");
        assert_eq!(expand.ready_timeout_ms, 20);
        assert_eq!(expand.advance_timeout_ms, 30);

        let next = &config.pagination.next_link;
        assert_eq!(next.selector, "a.next:not([disabled])");
        assert_eq!(next.ready_timeout_ms, 5000);
        assert_eq!(next.advance_timeout_ms, 40);
        assert_eq!(config.pagination.max_retries, 3);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/crawl.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[pagination]
max-retries = 0
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
