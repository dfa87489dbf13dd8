//! Pagination walker
//!
//! The walker drives one category through its listing pages. Discovery is
//! sequential: page n+1's URL is only known once page n has been parsed. Each
//! page is fetched and parsed in its own task holding a permit from the shared
//! concurrency budget; the walker launches the next page as soon as the URL is
//! known and never waits for the aggregator to consume a page's records.

use crate::config::{FailurePolicy, RunConfig, SiteConfig};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::PageParser;
use crate::crawler::record::PageOutcome;
use crate::state::WalkState;
use crate::{ConfigError, ScrapeError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Builds the listing URL for a category and page number
///
/// The page parameter is omitted for page 1.
///
/// # Example
///
/// ```
/// use listing_scraper::config::SiteConfig;
/// use listing_scraper::crawler::build_category_url;
///
/// let url = build_category_url(&SiteConfig::periplus(), "103", 2).unwrap();
/// assert_eq!(
///     url.as_str(),
///     "https://www.periplus.com/index.php?route=product%2Fcategory&anl=103&page=2"
/// );
/// ```
pub fn build_category_url(site: &SiteConfig, param: &str, page: u32) -> Result<Url, ConfigError> {
    let mut url = Url::parse(&site.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", site.base_url, e)))?;

    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &site.query_params {
            query.append_pair(key, value);
        }
        query.append_pair(&site.category_key, param);
        if page > 1 {
            query.append_pair(&site.page_key, &page.to_string());
        }
    }

    Ok(url)
}

/// What a page task reports back to the walker
#[derive(Debug)]
struct Discovery {
    success: bool,
    next_page_url: Option<String>,
}

/// Walks one category's pagination chain
#[derive(Clone)]
pub struct PaginationWalker {
    site: Arc<SiteConfig>,
    run: Arc<RunConfig>,
    fetcher: Arc<Fetcher>,
    parser: Arc<PageParser>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl PaginationWalker {
    pub fn new(
        site: Arc<SiteConfig>,
        run: Arc<RunConfig>,
        fetcher: Arc<Fetcher>,
        parser: Arc<PageParser>,
        permits: Arc<Semaphore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            site,
            run,
            fetcher,
            parser,
            permits,
            cancel,
        }
    }

    /// Walks the category until a terminal state and returns it
    ///
    /// Every page produces exactly one [`PageOutcome`] on `outcomes`. The method
    /// returns only after every page task it spawned has finished, so once it
    /// returns (and `outcomes` is dropped) the receiver sees all outcomes.
    ///
    /// # Arguments
    ///
    /// * `category` - Category name injected into every record
    /// * `param` - URL parameter selecting the category
    /// * `outcomes` - Channel feeding the aggregator
    pub async fn walk(
        &self,
        category: &str,
        param: &str,
        outcomes: mpsc::UnboundedSender<PageOutcome>,
    ) -> WalkState {
        let mut state = WalkState::Init;
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        let category: Arc<str> = Arc::from(category);

        let mut page: u32 = 1;
        let mut pending_url = match build_category_url(&self.site, param, 1) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                // Base URL is validated up front, so this only guards direct callers
                let _ = outcomes.send(PageOutcome::failed(1, "", ScrapeError::Config(e)));
                None
            }
        };

        tracing::info!("Starting walk of category '{}' (param: {})", category, param);

        loop {
            let Some(url) = pending_url.take() else {
                break;
            };

            if self.cancel.is_cancelled() {
                tracing::info!("Walk of '{}' cancelled before page {}", category, page);
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("Walk of '{}' cancelled before page {}", category, page);
                    break;
                }
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::error!("Concurrency budget closed; stopping walk of '{}'", category);
                        break;
                    }
                },
            };

            advance(&mut state, WalkState::FetchingPage(page));
            tracing::info!("Scraping page {} of '{}': {}", page, category, url);

            let (discovered_tx, discovered_rx) = oneshot::channel();
            let task = {
                let fetcher = self.fetcher.clone();
                let parser = self.parser.clone();
                let category = category.clone();
                let outcomes = outcomes.clone();
                let url = url.clone();
                let parse_retries = self.run.max_retries;

                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome =
                        process_page(&fetcher, &parser, page, &url, &category, parse_retries).await;

                    let _ = discovered_tx.send(Discovery {
                        success: outcome.is_success(),
                        next_page_url: outcome.next_page_url.clone(),
                    });
                    let _ = outcomes.send(outcome);
                })
            };
            tasks.push(task);

            let discovery = match discovered_rx.await {
                Ok(discovery) => discovery,
                Err(_) => {
                    tracing::error!("Worker for page {} of '{}' terminated unexpectedly", page, category);
                    let _ = outcomes.send(PageOutcome::failed(
                        page,
                        url.as_str(),
                        ScrapeError::Worker {
                            page,
                            message: "worker task terminated before reporting".to_string(),
                        },
                    ));
                    Discovery {
                        success: false,
                        next_page_url: None,
                    }
                }
            };

            if discovery.success {
                advance(&mut state, WalkState::Parsed(page));
            } else {
                advance(&mut state, WalkState::Aborted(page));
            }

            if page >= self.run.max_pages {
                tracing::info!("Reached page limit ({}) for '{}'", self.run.max_pages, category);
                break;
            }

            pending_url = if discovery.success {
                if discovery.next_page_url.is_none() {
                    tracing::info!("No more pages found for '{}' after page {}", category, page);
                }
                discovery.next_page_url
            } else {
                match self.run.failure_policy {
                    FailurePolicy::Continue => build_category_url(&self.site, param, page + 1)
                        .map(|url| url.to_string())
                        .ok(),
                    FailurePolicy::Stop => {
                        tracing::warn!("Stopping walk of '{}' after failed page {}", category, page);
                        None
                    }
                }
            };

            page += 1;
        }

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Page task for '{}' failed to join: {}", category, e);
            }
        }

        advance(&mut state, WalkState::Done);
        debug_assert!(state.is_terminal(), "walk returned in state {}", state);
        state
    }
}

/// Moves the walk to its next state, logging transitions the state machine forbids
fn advance(state: &mut WalkState, next: WalkState) {
    if !state.can_transition_to(next) {
        tracing::warn!("Unexpected walk transition {} -> {}", state, next);
    }
    tracing::trace!("Walk transition {} -> {}", state, next);
    *state = next;
}

/// Fetches and parses one page
///
/// A page whose markup cannot be parsed is fetched again, up to `parse_retries`
/// more times; fetch failures have already spent the fetcher's own retries.
async fn process_page(
    fetcher: &Fetcher,
    parser: &PageParser,
    page: u32,
    url: &str,
    category: &str,
    parse_retries: u32,
) -> PageOutcome {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let raw = match fetcher.fetch(url).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to fetch page {} ({}): {}", page, url, e);
                return PageOutcome::failed(page, url, ScrapeError::Fetch(e));
            }
        };

        match parser.parse(&raw, category) {
            Ok(parsed) => {
                tracing::info!("Scraped {} records from page {}", parsed.records.len(), page);
                return PageOutcome::parsed(page, url, parsed.records, parsed.next_page_url);
            }
            Err(e) if attempt <= parse_retries => {
                let wait = fetcher.backoff_for(attempt);
                tracing::warn!(
                    "Failed to parse page {} ({}): {}; fetching again in {:?}",
                    page,
                    url,
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                tracing::warn!("Failed to parse page {} ({}): {}", page, url, e);
                return PageOutcome::failed(page, url, ScrapeError::Parse(e));
            }
        }
    }
}
