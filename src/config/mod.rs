//! Configuration module for Careers-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; omitted keys fall back to the built-in site profile.
//!
//! # Example
//!
//! ```no_run
//! use careers_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawling {}", config.site.url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, FilterConfig, ListingConfig, OutputConfig,
    PaginationConfig, SiteConfig, StrategyConfig, TimeoutConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
