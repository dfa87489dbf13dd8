//! listing-scraper main entry point
//!
//! This is the command-line interface for the paginated listing scraper.

use anyhow::{bail, Context};
use clap::Parser;
use listing_scraper::config::{
    load_config_with_hash, validate, Config, FailurePolicy, OutputConfig, OutputFormat, RunConfig,
    SiteConfig,
};
use listing_scraper::crawler::build_category_url;
use listing_scraper::output::{format_totals, print_summary, write_report};
use listing_scraper::{CategoryRequest, RunCoordinator, RunReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// listing-scraper: walks paginated product listings and extracts records
///
/// Without a config file the built-in periplus.com site description is used.
/// Flags override values from the config file.
#[derive(Parser, Debug)]
#[command(name = "listing-scraper")]
#[command(version)]
#[command(about = "Paginated product listing scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Category to scrape
    #[arg(long, default_value = "new_releases")]
    category: String,

    /// Explicit URL parameter for the category
    #[arg(long, value_name = "PARAM")]
    category_param: Option<String>,

    /// Maximum number of pages per category
    #[arg(long, env = "MAX_PAGES")]
    max_pages: Option<u32>,

    /// Scrape several categories concurrently
    #[arg(long)]
    multiple: bool,

    /// Comma-separated `name` or `name:param` entries for --multiple (default: all predefined)
    #[arg(long, requires = "multiple")]
    categories: Option<String>,

    /// Minimum delay between request starts, in seconds
    #[arg(long, env = "DELAY")]
    delay: Option<f64>,

    /// Retries per request after the first attempt
    #[arg(long, env = "MAX_RETRIES")]
    retries: Option<u32>,

    /// Per-request timeout, in seconds
    #[arg(long, env = "TIMEOUT")]
    timeout: Option<f64>,

    /// Maximum number of concurrent requests
    #[arg(long, env = "CONCURRENT_REQUESTS")]
    concurrent: Option<usize>,

    /// Output format
    #[arg(long, value_enum, env = "OUTPUT_FORMAT")]
    output_format: Option<OutputFormat>,

    /// Output directory
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<String>,

    /// What to do after a page fails irrecoverably
    #[arg(long, value_enum)]
    failure_policy: Option<FailurePolicy>,

    /// Stop issuing new requests after this many seconds
    #[arg(long, value_name = "SECONDS")]
    run_timeout: Option<f64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Validate config and show what would be scraped without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level);

    let config = build_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&cli, &config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let reports = handle_scrape(&cli, &config).await?;

    let mut success = true;
    for report in &reports {
        success &= report.success;
        if let Err(e) = write_report(report, &config.output) {
            tracing::error!("Failed to write output for '{}': {}", report.category, e);
            success = false;
        }
        print_summary(report);
    }
    if reports.len() > 1 {
        println!("{}", format_totals(&reports));
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Sets up the logging/tracing subscriber
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("listing_scraper={},warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn seconds_to_ms(flag: &str, seconds: f64) -> anyhow::Result<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("--{} must be a non-negative number of seconds, got {}", flag, seconds);
    }
    Ok((seconds * 1000.0).round() as u64)
}

/// Loads the config file (or the built-in preset) and applies flag overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given; using the built-in periplus site");
            Config {
                site: SiteConfig::periplus(),
                run: RunConfig::default(),
                output: OutputConfig::default(),
            }
        }
    };

    let run = &mut config.run;
    if let Some(max_pages) = cli.max_pages {
        run.max_pages = max_pages;
    }
    if let Some(delay) = cli.delay {
        run.delay_ms = seconds_to_ms("delay", delay)?;
    }
    if let Some(retries) = cli.retries {
        run.max_retries = retries;
    }
    if let Some(timeout) = cli.timeout {
        run.timeout_ms = seconds_to_ms("timeout", timeout)?;
    }
    if let Some(concurrent) = cli.concurrent {
        run.concurrency = concurrent;
    }
    if let Some(policy) = cli.failure_policy {
        run.failure_policy = policy;
    }
    if let Some(run_timeout) = cli.run_timeout {
        run.run_timeout_ms = Some(seconds_to_ms("run-timeout", run_timeout)?);
    }
    if let Some(format) = cli.output_format {
        config.output.format = format;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

fn category_requests(cli: &Cli) -> Vec<CategoryRequest> {
    if cli.multiple {
        cli.categories
            .as_deref()
            .map(CategoryRequest::parse_list)
            .unwrap_or_default()
    } else {
        let request = match &cli.category_param {
            Some(param) => CategoryRequest::with_param(cli.category.as_str(), param.as_str()),
            None => CategoryRequest::new(cli.category.as_str()),
        };
        vec![request]
    }
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let coordinator = RunCoordinator::new(config.site.clone(), config.run.clone())?;
    let site = coordinator.site();
    let run = &config.run;

    println!("=== listing-scraper Dry Run ===\n");

    println!("Site: {} ({})", site.name, site.base_url);
    println!("\nRun Configuration:");
    println!("  Max pages: {}", run.max_pages);
    println!("  Delay: {}ms", run.delay_ms);
    println!("  Max retries: {}", run.max_retries);
    println!("  Timeout: {}ms", run.timeout_ms);
    println!("  Concurrency: {}", run.concurrency);
    println!("  Failure policy: {:?}", run.failure_policy);

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Directory: {}", config.output.directory);

    let mut requests = category_requests(cli);
    if requests.is_empty() {
        requests = site.category_params.keys().map(CategoryRequest::new).collect();
    }

    println!("\nCategories ({}):", requests.len());
    for request in &requests {
        let param = coordinator.resolve_category(request)?;
        let url = build_category_url(site, &param, 1)?;
        println!("  - {} -> {}", request.name, url);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the scrape itself; Ctrl-C stops new requests and keeps collected results
async fn handle_scrape(cli: &Cli, config: &Config) -> anyhow::Result<Vec<RunReport>> {
    let coordinator = RunCoordinator::new(config.site.clone(), config.run.clone())
        .context("Failed to set up the scraper")?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing in-flight requests");
            cancel.cancel();
        }
    });

    let requests = category_requests(cli);
    let reports = if cli.multiple {
        coordinator.run_multiple(&requests).await?
    } else {
        let request = requests
            .first()
            .context("No category requested")?;
        vec![coordinator.run(request).await?]
    };

    Ok(reports)
}
