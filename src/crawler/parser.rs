//! HTML parser for extracting listing records
//!
//! This module turns a fetched listing page into records using the selector
//! mapping of a [`SiteConfig`]. One parser type serves every site:
//! - `product_container` locates the records on the page
//! - every other field selector is resolved relative to its container
//! - the pagination selector is resolved against the whole page

use crate::config::{compile_selector, SiteConfig};
use crate::crawler::fetcher::RawPage;
use crate::crawler::record::Record;
use crate::ConfigError;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Errors raised while parsing a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed markup: {0}")]
    MalformedMarkup(String),
}

/// Records and pagination link extracted from one page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Records in document order
    pub records: Vec<Record>,

    /// Absolute URL of the next page, if the page links one
    pub next_page_url: Option<String>,
}

/// Compiled per-field selectors
#[derive(Debug)]
struct FieldSelectors {
    title: Selector,
    author: Selector,
    price: Selector,
    image: Selector,
    link: Selector,
    availability: Selector,
}

/// Compiled form of [`PriceRule`](crate::config::PriceRule)
#[derive(Debug)]
struct PricePicker {
    candidate: Selector,
    exclude: Option<Selector>,
    marker: Option<String>,
}

impl PricePicker {
    /// First qualifying candidate inside the price element
    fn pick(&self, price: &ElementRef) -> Option<String> {
        price
            .select(&self.candidate)
            .filter(|candidate| candidate.id() != price.id())
            .filter(|candidate| !self.is_excluded(candidate))
            .map(|candidate| normalized_text(&candidate))
            .find(|text| {
                !text.is_empty()
                    && self
                        .marker
                        .as_deref()
                        .map_or(true, |marker| text.contains(marker))
            })
    }

    fn is_excluded(&self, candidate: &ElementRef) -> bool {
        self.exclude.as_ref().is_some_and(|exclude| {
            exclude.matches(candidate) || candidate.select(exclude).next().is_some()
        })
    }
}

/// Selector-driven page parser
///
/// Selectors are compiled once when the parser is built, so a broken
/// configuration is rejected before any page is fetched.
#[derive(Debug)]
pub struct PageParser {
    base_url: Url,
    container: Selector,
    fields: FieldSelectors,
    pagination: Selector,
    anchor: Selector,
    product_link_filter: Option<String>,
    price_picker: Option<PricePicker>,
    author_fallback: Option<Selector>,
}

impl PageParser {
    /// Builds a parser from a site configuration
    ///
    /// # Returns
    ///
    /// * `Ok(PageParser)` - All selectors compiled
    /// * `Err(ConfigError)` - A selector is missing or invalid, or the base URL is invalid
    pub fn new(site: &SiteConfig) -> Result<Self, ConfigError> {
        let field = |key: &str| -> Result<Selector, ConfigError> {
            let selector = site
                .selector(key)
                .ok_or_else(|| ConfigError::MissingSelectorKey(key.to_string()))?;
            compile_selector(key, selector)
        };

        let base_url = Url::parse(&site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", site.base_url, e)))?;

        let price_picker = match &site.price_rule {
            Some(rule) => Some(PricePicker {
                candidate: compile_selector("price-rule.candidate", &rule.candidate)?,
                exclude: rule
                    .exclude
                    .as_deref()
                    .map(|exclude| compile_selector("price-rule.exclude", exclude))
                    .transpose()?,
                marker: rule.marker.clone().filter(|m| !m.is_empty()),
            }),
            None => None,
        };

        Ok(Self {
            base_url,
            container: field("product_container")?,
            fields: FieldSelectors {
                title: field("title")?,
                author: field("author")?,
                price: field("price")?,
                image: field("image")?,
                link: field("link")?,
                availability: field("availability")?,
            },
            pagination: compile_selector("pagination", &site.pagination_selector)?,
            anchor: compile_selector("anchor", "a")?,
            product_link_filter: site
                .product_link_filter
                .clone()
                .filter(|f| !f.is_empty()),
            price_picker,
            author_fallback: site
                .author_fallback
                .as_deref()
                .map(|fallback| compile_selector("author-fallback", fallback))
                .transpose()?,
        })
    }

    /// Parses a fetched page
    pub fn parse(&self, page: &RawPage, category: &str) -> Result<ParsedPage, ParseError> {
        self.parse_html(&page.body, category)
    }

    /// Parses HTML content into records and the next page URL
    ///
    /// # Rules
    ///
    /// - An empty body yields no records and no next page
    /// - A body without any markup is a `MalformedMarkup` error
    /// - Zero containers is not an error: a page may have no products
    /// - A field whose selector matches nothing inside its container is `""`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use listing_scraper::config::SiteConfig;
    /// use listing_scraper::crawler::PageParser;
    ///
    /// let parser = PageParser::new(&SiteConfig::periplus()).unwrap();
    /// let parsed = parser.parse_html("<html><body></body></html>", "new_releases").unwrap();
    /// assert!(parsed.records.is_empty());
    /// ```
    pub fn parse_html(&self, html: &str, category: &str) -> Result<ParsedPage, ParseError> {
        let trimmed = html.trim();
        if trimmed.is_empty() {
            tracing::debug!("Empty page body, no records");
            return Ok(ParsedPage::default());
        }

        if !trimmed.contains('<') {
            return Err(ParseError::MalformedMarkup(
                "response body contains no markup".to_string(),
            ));
        }

        let document = Html::parse_document(html);

        let containers: Vec<ElementRef> = document
            .select(&self.container)
            .filter(|container| self.is_product(container))
            .collect();
        tracing::debug!("Found {} product containers", containers.len());

        let scraped_at = Utc::now();
        let records = containers
            .iter()
            .map(|container| self.extract_record(container, category, scraped_at))
            .collect();

        Ok(ParsedPage {
            records,
            next_page_url: self.extract_next_page(&document),
        })
    }

    /// Applies the product link filter, if configured
    fn is_product(&self, container: &ElementRef) -> bool {
        let Some(filter) = &self.product_link_filter else {
            return true;
        };

        container
            .select(&self.anchor)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.contains(filter.as_str()))
            .unwrap_or(false)
    }

    /// Extracts one record; missing fields become empty strings
    fn extract_record(
        &self,
        container: &ElementRef,
        category: &str,
        scraped_at: chrono::DateTime<Utc>,
    ) -> Record {
        let image_url = container
            .select(&self.fields.image)
            .next()
            .and_then(|img| {
                img.value()
                    .attr("src")
                    .filter(|src| !src.trim().is_empty())
                    .or_else(|| img.value().attr("data-src"))
            })
            .map(|src| self.resolve(src))
            .unwrap_or_default();

        let product_url = container
            .select(&self.fields.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| self.resolve(href))
            .unwrap_or_default();

        Record {
            title: select_text(container, &self.fields.title),
            author: self.extract_author(container),
            price: self.extract_price(container),
            image_url,
            product_url,
            availability: select_text(container, &self.fields.availability),
            category: category.to_string(),
            scraped_at,
        }
    }

    /// Author text, falling back to the first non-empty fallback match
    fn extract_author(&self, container: &ElementRef) -> String {
        let author = select_text(container, &self.fields.author);
        if !author.is_empty() {
            return author;
        }

        self.author_fallback
            .as_ref()
            .and_then(|fallback| {
                container
                    .select(fallback)
                    .map(|element| normalized_text(&element))
                    .find(|text| !text.is_empty())
            })
            .unwrap_or_default()
    }

    /// Price text; a price rule narrows it to the current price
    fn extract_price(&self, container: &ElementRef) -> String {
        let Some(price) = container.select(&self.fields.price).next() else {
            return String::new();
        };

        self.price_picker
            .as_ref()
            .and_then(|picker| picker.pick(&price))
            .unwrap_or_else(|| normalized_text(&price))
    }

    /// Resolves the pagination link against the base URL
    fn extract_next_page(&self, document: &Html) -> Option<String> {
        let href = document
            .select(&self.pagination)
            .find_map(|element| element.value().attr("href"))?
            .trim();

        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }

        match self.base_url.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::debug!("Ignoring unresolvable pagination link {}: {}", href, e);
                None
            }
        }
    }

    /// Makes a link absolute relative to the base URL, keeping it verbatim if it cannot be
    fn resolve(&self, href: &str) -> String {
        let href = href.trim();
        self.base_url
            .join(href)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}

/// Text of the first match inside `container`, whitespace-normalised
fn select_text(container: &ElementRef, selector: &Selector) -> String {
    container
        .select(selector)
        .next()
        .map(|element| normalized_text(&element))
        .unwrap_or_default()
}

fn normalized_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
