use crate::config::types::{Config, RunConfig, SiteConfig, REQUIRED_SELECTOR_KEYS};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_run_config(&config.run)?;

    if config.output.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a site configuration
///
/// Every required selector key must be present and compile as a CSS selector,
/// and the base URL must be an absolute HTTP(S) URL.
pub fn validate_site_config(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.name.is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    let base = Url::parse(&site.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", site.base_url, e)))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use HTTP or HTTPS",
            site.base_url
        )));
    }

    for key in REQUIRED_SELECTOR_KEYS {
        let selector = site
            .selector(key)
            .ok_or_else(|| ConfigError::MissingSelectorKey(key.to_string()))?;
        compile_selector(key, selector)?;
    }

    compile_selector("pagination", &site.pagination_selector)?;

    if let Some(rule) = &site.price_rule {
        compile_selector("price-rule.candidate", &rule.candidate)?;
        if let Some(exclude) = &rule.exclude {
            compile_selector("price-rule.exclude", exclude)?;
        }
    }
    if let Some(fallback) = &site.author_fallback {
        compile_selector("author-fallback", fallback)?;
    }

    if site.category_key.is_empty() || site.page_key.is_empty() {
        return Err(ConfigError::Validation(
            "category_key and page_key cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates run tunables
pub fn validate_run_config(run: &RunConfig) -> Result<(), ConfigError> {
    if run.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            run.max_pages
        )));
    }

    if run.concurrency < 1 || run.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            run.concurrency
        )));
    }

    if run.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout must be greater than zero".to_string(),
        ));
    }

    if run.run_timeout_ms == Some(0) {
        return Err(ConfigError::Validation(
            "run_timeout must be greater than zero when set".to_string(),
        ));
    }

    Ok(())
}

/// Compiles a CSS selector, mapping failures to a config error naming the key
pub(crate) fn compile_selector(key: &str, selector: &str) -> Result<Selector, ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector {
            key: key.to_string(),
            message: "selector is empty".to_string(),
        });
    }

    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        key: key.to_string(),
        message: format!("{:?}", e),
    })
}
