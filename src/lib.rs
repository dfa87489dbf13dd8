//! listing-scraper: a paginated product listing extractor
//!
//! This crate walks the paginated category pages of an e-commerce site, extracts
//! product records through a declarative selector mapping, and aggregates the
//! per-page outcomes into a single ordered report.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;

use thiserror::Error;

/// Main error type for listing-scraper operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] crawler::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker for page {page} failed: {message}")]
    Worker { page: u32, message: String },
}

/// Configuration-specific errors
///
/// These are fatal: they are reported before any page is fetched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing required selector key: {0}")]
    MissingSelectorKey(String),

    #[error("Invalid selector for '{key}': {message}")]
    InvalidSelector { key: String, message: String },

    #[error("Invalid category: {0}")]
    InvalidCategory(String),
}

/// Result type alias for listing-scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, FailurePolicy, RunConfig, SiteConfig};
pub use crawler::{CategoryRequest, Record, RunCoordinator, RunReport};
pub use state::WalkState;
