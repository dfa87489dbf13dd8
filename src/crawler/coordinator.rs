//! Run coordinator - orchestrates category runs
//!
//! The coordinator owns everything a run shares: the fetcher (and with it the
//! rate limiter), the compiled parser, the concurrency budget and the
//! cancellation token. Each category gets its own walker and aggregator.

use crate::config::{validate_run_config, validate_site_config, RunConfig, SiteConfig};
use crate::crawler::aggregator::ResultAggregator;
use crate::crawler::fetcher::{Fetcher, HttpTransport, Transport};
use crate::crawler::parser::PageParser;
use crate::crawler::record::RunReport;
use crate::crawler::walker::PaginationWalker;
use crate::{ConfigError, ScrapeError};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// A category to scrape, optionally with an explicit URL parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRequest {
    pub name: String,

    /// Explicit parameter; when absent the site's predefined one is used
    pub param: Option<String>,
}

impl CategoryRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: None,
        }
    }

    pub fn with_param(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: Some(param.into()),
        }
    }

    /// Parses a comma-separated list of `name` or `name:param` entries
    ///
    /// # Example
    ///
    /// ```
    /// use listing_scraper::CategoryRequest;
    ///
    /// let requests = CategoryRequest::parse_list("fiction:12, bestsellers");
    /// assert_eq!(requests[0], CategoryRequest::with_param("fiction", "12"));
    /// assert_eq!(requests[1], CategoryRequest::new("bestsellers"));
    /// ```
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((name, param)) if !param.trim().is_empty() => {
                    Self::with_param(name.trim(), param.trim())
                }
                Some((name, _)) => Self::new(name.trim()),
                None => Self::new(entry),
            })
            .collect()
    }
}

/// Coordinates single and multiple category runs against one site
pub struct RunCoordinator {
    site: Arc<SiteConfig>,
    run: Arc<RunConfig>,
    fetcher: Arc<Fetcher>,
    parser: Arc<PageParser>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl RunCoordinator {
    /// Creates a coordinator fetching over HTTP
    ///
    /// # Returns
    ///
    /// * `Ok(RunCoordinator)` - Configuration valid and HTTP client built
    /// * `Err(ScrapeError)` - Invalid configuration or client construction failed
    pub fn new(site: SiteConfig, run: RunConfig) -> Result<Self, ScrapeError> {
        validate_run_config(&run)?;
        let transport = HttpTransport::new(&run)?;
        Ok(Self::with_transport(site, run, Arc::new(transport))?)
    }

    /// Creates a coordinator over an arbitrary transport
    ///
    /// Both configurations are validated and every selector is compiled here,
    /// before anything is fetched.
    pub fn with_transport(
        site: SiteConfig,
        run: RunConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        validate_site_config(&site)?;
        validate_run_config(&run)?;

        let parser = PageParser::new(&site)?;
        let fetcher = Fetcher::new(transport, &run);
        let permits = Semaphore::new(run.concurrency);

        Ok(Self {
            site: Arc::new(site),
            run: Arc::new(run),
            fetcher: Arc::new(fetcher),
            parser: Arc::new(parser),
            permits: Arc::new(permits),
            cancel: CancellationToken::new(),
        })
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Token cancelling every current and future run of this coordinator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves the URL parameter for a category
    ///
    /// An explicit parameter wins over the site's predefined one.
    pub fn resolve_category(&self, request: &CategoryRequest) -> Result<String, ConfigError> {
        if let Some(param) = request.param.as_deref().filter(|p| !p.trim().is_empty()) {
            return Ok(param.to_string());
        }

        self.site
            .category_param(&request.name)
            .map(str::to_string)
            .ok_or_else(|| {
                let known: Vec<&str> = self.site.category_params.keys().map(String::as_str).collect();
                ConfigError::InvalidCategory(format!(
                    "'{}' is not a predefined category of {} (known: {})",
                    request.name,
                    self.site.name,
                    if known.is_empty() { "none".to_string() } else { known.join(", ") }
                ))
            })
    }

    /// Scrapes one category
    ///
    /// Only configuration problems are returned as errors; page failures and
    /// internal failures end up in the report's `errors`.
    pub async fn run(&self, request: &CategoryRequest) -> Result<RunReport, ConfigError> {
        let param = self.resolve_category(request)?;
        let cancel = self.run_token();

        let report = self.run_category(&request.name, &param, cancel.clone()).await;
        cancel.cancel();

        Ok(report)
    }

    /// Scrapes several categories concurrently, one report per category
    ///
    /// All categories share the concurrency budget and the rate limiter. An
    /// empty list runs every predefined category of the site. Every category is
    /// resolved before the first fetch.
    pub async fn run_multiple(
        &self,
        requests: &[CategoryRequest],
    ) -> Result<Vec<RunReport>, ConfigError> {
        let requests: Vec<CategoryRequest> = if requests.is_empty() {
            self.site
                .category_params
                .keys()
                .map(CategoryRequest::new)
                .collect()
        } else {
            requests.to_vec()
        };

        let resolved = requests
            .iter()
            .map(|request| Ok((request.name.clone(), self.resolve_category(request)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        tracing::info!(
            "Running {} categories with a shared budget of {} concurrent requests",
            resolved.len(),
            self.run.concurrency
        );

        let cancel = self.run_token();
        let runs = resolved
            .iter()
            .map(|(name, param)| self.run_category(name, param, cancel.clone()));
        let reports = join_all(runs).await;
        cancel.cancel();

        Ok(reports)
    }

    /// Child token for one run, cancelled by the run timeout if one is set
    fn run_token(&self) -> CancellationToken {
        let token = self.cancel.child_token();

        if let Some(limit) = self.run.run_timeout() {
            let timer = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        tracing::warn!("Run timeout of {:?} reached; stopping new fetches", limit);
                        timer.cancel();
                    }
                    _ = timer.cancelled() => {}
                }
            });
        }

        token
    }

    async fn run_category(&self, category: &str, param: &str, cancel: CancellationToken) -> RunReport {
        let started_at = Utc::now();
        let mut aggregator = ResultAggregator::new(self.site.name.clone(), category, started_at);

        let walker = PaginationWalker::new(
            self.site.clone(),
            self.run.clone(),
            self.fetcher.clone(),
            self.parser.clone(),
            self.permits.clone(),
            cancel.clone(),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let walk = {
            let category = category.to_string();
            let param = param.to_string();
            tokio::spawn(async move { walker.walk(&category, &param, tx).await })
        };

        // Single writer: only this loop touches the aggregator
        while let Some(outcome) = rx.recv().await {
            aggregator.ingest(outcome);
        }

        match walk.await {
            Ok(state) => tracing::debug!("Walk of '{}' ended in state {}", category, state),
            Err(e) => {
                tracing::error!("Walk of '{}' terminated unexpectedly: {}", category, e);
                aggregator.record_failure(format!(
                    "walk of '{}' terminated unexpectedly: {}",
                    category, e
                ));
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(
                "Run of '{}' was cancelled; keeping {} collected page(s)",
                category,
                aggregator.pages_ingested()
            );
        }

        aggregator.close(Utc::now());
        let report = aggregator.finalize();

        tracing::info!(
            "Finished '{}': {} records from {} pages, {} error(s) in {}ms",
            category,
            report.total_records,
            report.pages_scraped,
            report.errors.len(),
            report.duration().num_milliseconds()
        );

        report
    }
}
