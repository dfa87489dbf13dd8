use clap::ValueEnum;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Selector keys every site configuration must provide
pub const REQUIRED_SELECTOR_KEYS: [&str; 7] = [
    "product_container",
    "title",
    "author",
    "price",
    "image",
    "link",
    "availability",
];

/// Main configuration structure, as loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Declarative description of a target site
///
/// Adding a new site only requires a new value of this type; the parser is
/// driven entirely by the selector mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Identifier used in reports and output file names
    pub name: String,

    /// Listing endpoint; category and page parameters are appended to it
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Semantic field name -> CSS selector
    pub selectors: BTreeMap<String, String>,

    /// Selector locating the "next page" link
    #[serde(rename = "pagination-selector")]
    pub pagination_selector: String,

    /// Category name -> URL parameter value
    #[serde(rename = "categories", default)]
    pub category_params: BTreeMap<String, String>,

    /// Fixed query parameters added to every listing URL
    #[serde(rename = "query-params", default)]
    pub query_params: BTreeMap<String, String>,

    /// Query key carrying the category parameter
    #[serde(rename = "category-key", default = "default_category_key")]
    pub category_key: String,

    /// Query key carrying the page number (omitted for page 1)
    #[serde(rename = "page-key", default = "default_page_key")]
    pub page_key: String,

    /// Substring the first link of a container must contain to count as a product
    #[serde(rename = "product-link-filter", default)]
    pub product_link_filter: Option<String>,

    /// Picks the current price out of a price element holding several
    #[serde(rename = "price-rule", default)]
    pub price_rule: Option<PriceRule>,

    /// Searched for the first non-empty text when the author selector yields nothing
    #[serde(rename = "author-fallback", default)]
    pub author_fallback: Option<String>,
}

/// Selects one price among the candidates inside the price element
///
/// The first candidate with text that contains `marker` and neither matches
/// nor contains `exclude` wins. Without a winner the whole price element's
/// text is used.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRule {
    /// Candidate elements, relative to the price element
    pub candidate: String,

    /// Marks struck-out prices
    #[serde(default)]
    pub exclude: Option<String>,

    /// Text a candidate must contain, e.g. a currency symbol
    #[serde(default)]
    pub marker: Option<String>,
}

fn default_category_key() -> String {
    "category".to_string()
}

fn default_page_key() -> String {
    "page".to_string()
}

impl SiteConfig {
    /// Built-in configuration for periplus.com
    pub fn periplus() -> Self {
        let selectors = [
            ("product_container", "div.single-product"),
            ("title", "h3 a"),
            ("author", ".product-author a"),
            ("price", ".product-price"),
            ("image", ".product-img img.default-img"),
            ("link", "h3 a"),
            ("availability", ".product-binding"),
        ];
        let categories = [
            ("new_releases", "103"),
            ("bestsellers", "104"),
            ("featured", "105"),
        ];

        Self {
            name: "periplus".to_string(),
            base_url: "https://www.periplus.com/index.php".to_string(),
            selectors: selectors
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            pagination_selector: "ul.pagination li a[rel='next']".to_string(),
            category_params: categories
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            query_params: BTreeMap::from([(
                "route".to_string(),
                "product/category".to_string(),
            )]),
            category_key: "anl".to_string(),
            page_key: "page".to_string(),
            product_link_filter: Some("/p/".to_string()),
            price_rule: Some(PriceRule {
                candidate: "div".to_string(),
                exclude: Some("[style*='line-through']".to_string()),
                marker: Some("Rp".to_string()),
            }),
            author_fallback: Some(".product-author a".to_string()),
        }
    }

    /// Looks up the selector for a semantic field
    pub fn selector(&self, key: &str) -> Option<&str> {
        self.selectors.get(key).map(String::as_str)
    }

    /// Looks up the predefined URL parameter for a category name
    pub fn category_param(&self, category: &str) -> Option<&str> {
        self.category_params.get(category).map(String::as_str)
    }
}

/// What the walker does after a page fails irrecoverably
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep walking using the page-number URL sequence
    #[default]
    Continue,

    /// End the walk at the first failed page
    Stop,
}

/// Tunables for one run
///
/// Keys missing from the `[run]` table fall back to [`RunConfig::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of pages walked per category
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Minimum spacing between request starts (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Retries per request after the first attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Maximum number of requests in flight
    pub concurrency: usize,

    #[serde(rename = "failure-policy")]
    pub failure_policy: FailurePolicy,

    /// Optional deadline for the whole run (milliseconds)
    #[serde(rename = "run-timeout-ms")]
    pub run_timeout_ms: Option<u64>,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("listing-scraper/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            delay_ms: 1000,
            max_retries: 3,
            timeout_ms: 30_000,
            concurrency: 5,
            failure_policy: FailurePolicy::Continue,
            run_timeout_ms: None,
            user_agent: default_user_agent(),
        }
    }
}

impl RunConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }
}

/// Report serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Both,
}

impl OutputFormat {
    pub fn writes_json(&self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub fn writes_csv(&self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Directory report files are written to
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

fn default_output_directory() -> String {
    "output".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            directory: default_output_directory(),
        }
    }
}
