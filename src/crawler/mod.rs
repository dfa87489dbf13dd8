//! Crawler module for listing page fetching and processing
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with rate limiting and retry logic
//! - Selector-driven HTML parsing
//! - Pagination walking over a shared concurrency budget
//! - Result aggregation and run coordination

mod aggregator;
mod coordinator;
mod fetcher;
mod parser;
mod record;
mod walker;

pub use aggregator::ResultAggregator;
pub use coordinator::{CategoryRequest, RunCoordinator};
pub use fetcher::{
    build_http_client, AttemptError, FetchError, FetchErrorKind, Fetcher, HttpTransport, RawPage,
    Transport, MAX_BACKOFF,
};
pub use parser::{PageParser, ParseError, ParsedPage};
pub use record::{PageOutcome, Record, RunReport};
pub use walker::{build_category_url, PaginationWalker};

