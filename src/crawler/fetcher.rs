//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building the HTTP client with the configured user agent and headers
//! - Spacing request starts through the shared rate limiter
//! - Bounding each attempt by the per-request timeout
//! - Retrying failures with exponential backoff
//! - Error classification

use crate::config::RunConfig;
use crate::state::RateLimiter;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for a single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Raw content of a successfully fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code (always 2xx)
    pub status: u16,

    /// Page body; may be empty
    pub body: String,
}

/// Classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// No response within the per-request timeout
    Timeout,

    /// DNS, connect, TLS or body transfer failure
    ConnectionFailure,

    /// The server answered with a non-2xx status
    HttpStatus(u16),
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionFailure => write!(f, "connection failure"),
            Self::HttpStatus(code) => write!(f, "HTTP status {}", code),
        }
    }
}

/// A single failed attempt, as reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl AttemptError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Final failure of a fetch after all retries were spent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} after {attempts} attempt(s): {last_error}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub attempts: u32,
    pub last_error: String,
}

/// Performs a single GET request
///
/// The fetcher layers rate limiting, timeouts and retries on top of a transport,
/// so implementations only need to perform one attempt and classify its failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawPage, AttemptError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The run configuration (user agent and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &RunConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(config.timeout().min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &RunConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawPage, AttemptError> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(AttemptError::new(
                FetchErrorKind::HttpStatus(status.as_u16()),
                format!("HTTP {} for {}", status.as_u16(), url),
            ));
        }

        let body = response.text().await.map_err(classify_error)?;

        Ok(RawPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(error: reqwest::Error) -> AttemptError {
    let kind = if error.is_timeout() {
        FetchErrorKind::Timeout
    } else if let Some(status) = error.status() {
        FetchErrorKind::HttpStatus(status.as_u16())
    } else {
        FetchErrorKind::ConnectionFailure
    };

    AttemptError::new(kind, error.to_string())
}

/// Rate-limited, retrying fetcher
///
/// One instance is shared by every worker of a run; its rate limiter is the only
/// mutable state they share.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl Fetcher {
    /// Creates a fetcher over the given transport using the run's tunables
    pub fn new(transport: Arc<dyn Transport>, config: &RunConfig) -> Self {
        Self {
            transport,
            limiter: RateLimiter::new(config.delay()),
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff_base: config.delay(),
        }
    }

    /// Backoff applied after the given failed attempt (1-based)
    ///
    /// Doubles from the configured delay and never exceeds [`MAX_BACKOFF`].
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    /// Fetches a URL, retrying failures up to `max_retries` times
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx (including empty body) | Success |
    /// | Non-2xx status | Retry with backoff |
    /// | Timeout | Retry with backoff |
    /// | Connection failure | Retry with backoff |
    ///
    /// Every attempt, retries included, waits for its slot in the rate limiter.
    pub async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let max_attempts = self.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.acquire().await;

            let result = match tokio::time::timeout(self.timeout, self.transport.get(url)).await {
                Ok(result) => result,
                Err(_) => Err(AttemptError::new(
                    FetchErrorKind::Timeout,
                    format!("no response within {:?}", self.timeout),
                )),
            };

            match result {
                Ok(page) => {
                    tracing::debug!(
                        "Fetched {} ({} bytes, attempt {}/{})",
                        url,
                        page.body.len(),
                        attempt,
                        max_attempts
                    );
                    return Ok(page);
                }
                Err(error) if attempt < max_attempts => {
                    let wait = self.backoff_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}; retrying in {:?}",
                        attempt,
                        max_attempts,
                        url,
                        error.message,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(error) => {
                    tracing::error!(
                        "Giving up on {} after {} attempt(s): {}",
                        url,
                        attempt,
                        error.message
                    );
                    return Err(FetchError {
                        kind: error.kind,
                        attempts: attempt,
                        last_error: error.message,
                    });
                }
            }
        }
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("limiter", &self.limiter)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
