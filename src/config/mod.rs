//! Configuration module for listing-scraper
//!
//! This module holds the declarative site description, the run tunables, and
//! the TOML loading and validation around them.
//!
//! # Example
//!
//! ```no_run
//! use listing_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("site.toml")).unwrap();
//! println!("Walking at most {} pages", config.run.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FailurePolicy, OutputConfig, OutputFormat, PriceRule, RunConfig, SiteConfig,
    REQUIRED_SELECTOR_KEYS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_run_config, validate_site_config};

pub(crate) use validation::compile_selector;
