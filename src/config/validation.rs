use crate::config::types::{
    Config, FilterConfig, ListingConfig, OutputConfig, PaginationConfig, SiteConfig,
    StrategyConfig, TimeoutConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_filter_config(&config.filter)?;
    validate_listing_config(&config.listing)?;
    validate_pagination_config(&config.pagination)?;
    validate_timeout_config(&config.timeouts, &config.pagination)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site url '{}': {}", config.url, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Site url '{}' must use http or https",
            config.url
        )));
    }

    require_non_empty("site.results-selector", &config.results_selector)?;
    require_non_empty("site.total-results-attribute", &config.total_results_attribute)?;
    require_non_empty("site.current-page-attribute", &config.current_page_attribute)?;
    require_non_empty("site.total-pages-attribute", &config.total_pages_attribute)?;
    Ok(())
}

fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    require_non_empty("filter.toggle-selector", &config.toggle_selector)?;
    require_non_empty("filter.expanded-class", &config.expanded_class)?;
    require_non_empty("filter.option-selector", &config.option_selector)?;
    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    require_non_empty("listing.item-selector", &config.item_selector)?;
    require_non_empty("listing.title-selector", &config.title_selector)?;
    require_non_empty("listing.department-selector", &config.department_selector)?;
    require_non_empty("listing.location-selector", &config.location_selector)?;
    require_non_empty("listing.id-attribute", &config.id_attribute)?;
    require_non_empty("listing.url-attribute", &config.url_attribute)?;
    Ok(())
}

fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "pagination.max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(format!(
            "pagination.max-consecutive-failures must be >= 1, got {}",
            config.max_consecutive_failures
        )));
    }

    validate_strategy("pagination.expand-in-place", &config.expand_in_place)?;
    validate_strategy("pagination.next-link", &config.next_link)?;
    Ok(())
}

fn validate_strategy(name: &str, config: &StrategyConfig) -> Result<(), ConfigError> {
    require_non_empty(&format!("{}.selector", name), &config.selector)?;
    require_positive(&format!("{}.ready-timeout-ms", name), config.ready_timeout_ms)?;
    require_positive(&format!("{}.advance-timeout-ms", name), config.advance_timeout_ms)?;
    Ok(())
}

/// Every wait must allow at least one poll before it expires
fn validate_timeout_config(
    config: &TimeoutConfig,
    pagination: &PaginationConfig,
) -> Result<(), ConfigError> {
    require_positive("timeouts.poll-interval-ms", config.poll_interval_ms)?;

    let waits = [
        ("timeouts.results-ms", config.results_ms),
        ("timeouts.filter-toggle-ms", config.filter_toggle_ms),
        ("timeouts.filter-option-ms", config.filter_option_ms),
        ("timeouts.filter-apply-ms", config.filter_apply_ms),
        ("timeouts.listing-ms", config.listing_ms),
        ("timeouts.refresh-ms", config.refresh_ms),
        (
            "pagination.expand-in-place.ready-timeout-ms",
            pagination.expand_in_place.ready_timeout_ms,
        ),
        (
            "pagination.expand-in-place.advance-timeout-ms",
            pagination.expand_in_place.advance_timeout_ms,
        ),
        (
            "pagination.next-link.ready-timeout-ms",
            pagination.next_link.ready_timeout_ms,
        ),
        (
            "pagination.next-link.advance-timeout-ms",
            pagination.next_link.advance_timeout_ms,
        ),
    ];

    for (name, value) in waits {
        require_positive(name, value)?;
        if value <= config.poll_interval_ms {
            return Err(ConfigError::Validation(format!(
                "{} ({}ms) must be longer than timeouts.poll-interval-ms ({}ms)",
                name, value, config.poll_interval_ms
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.store_path {
        require_non_empty("output.store-path", path)?;
        return Ok(());
    }

    require_non_empty("output.directory", &config.directory)?;
    require_non_empty("output.file-prefix", &config.file_prefix)?;

    if !config
        .file_prefix
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "output.file-prefix must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.file_prefix
        )));
    }

    Ok(())
}

fn require_non_empty(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }
    Ok(())
}

fn require_positive(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!("{} must be > 0", name)));
    }
    Ok(())
}
