//! End-to-end walks against a mock listing site
//!
//! These tests use wiremock to serve paginated listing pages and drive the
//! coordinator through real HTTP requests.

use listing_scraper::config::{load_config, OutputConfig, OutputFormat, RunConfig, SiteConfig};
use listing_scraper::output::write_report;
use listing_scraper::{CategoryRequest, FailurePolicy, RunCoordinator};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// The periplus site description pointed at the mock server
fn mock_site(server: &MockServer) -> SiteConfig {
    SiteConfig {
        base_url: format!("{}/index.php", server.uri()),
        ..SiteConfig::periplus()
    }
}

fn fast_run() -> RunConfig {
    RunConfig {
        max_pages: 10,
        delay_ms: 10,
        max_retries: 1,
        timeout_ms: 5_000,
        concurrency: 2,
        ..RunConfig::default()
    }
}

/// Renders one product tile in periplus markup
fn product(id: u32, title: &str, author: Option<&str>, price: &str) -> String {
    let author = author
        .map(|a| format!(r#"<div class="product-author"><a href="/author/{0}">{0}</a></div>"#, a))
        .unwrap_or_default();
    format!(
        r#"<div class="single-product">
             <div class="product-img"><a href="/p/{id}/book"><img class="default-img" src="" data-src="/img/{id}.jpg"></a></div>
             <div class="product-content">
               <h3><a href="/p/{id}/book">{title}</a></h3>
               {author}
               <div class="product-price">{price}</div>
               <div class="product-binding">Paperback</div>
             </div>
           </div>"#,
        id = id,
        title = title,
        author = author,
        price = price
    )
}

/// Renders a listing page with an optional link to the next page
fn listing(products: &[String], next_page: Option<u32>) -> String {
    let pagination = next_page
        .map(|n| {
            format!(
                r#"<ul class="pagination"><li><a rel="next" href="index.php?route=product/category&amp;anl=103&amp;page={}">&gt;</a></li></ul>"#,
                n
            )
        })
        .unwrap_or_default();
    format!(
        "<html><body><div class=\"row\">{}</div>{}</body></html>",
        products.concat(),
        pagination
    )
}

/// Matches requests whose query string lacks the given key
struct QueryKeyAbsent(&'static str);

impl Match for QueryKeyAbsent {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == self.0)
    }
}

/// Mounts a listing page; page 1 is the URL without a page parameter
async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
    let mock = Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("route", "product/category"))
        .and(query_param("anl", "103"));

    let mock = if page == 1 {
        mock.and(QueryKeyAbsent("page"))
    } else {
        mock.and(query_param("page", page.to_string()))
    };

    mock.respond_with(response).mount(server).await;
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_full_walk_follows_pagination() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        1,
        html(listing(
            &[
                product(1, "Alpha", Some("Ann"), "Rp 100.000"),
                product(2, "Beta", Some("Ben"), "Rp 120.000"),
            ],
            Some(2),
        )),
    )
    .await;
    mount_page(
        &server,
        2,
        html(listing(&[product(3, "Gamma", None, "Rp 90.000")], Some(3))),
    )
    .await;
    mount_page(
        &server,
        3,
        html(listing(&[product(4, "Delta", Some("Dee"), "Rp 80.000")], None)),
    )
    .await;

    let coordinator = RunCoordinator::new(mock_site(&server), fast_run()).unwrap();
    let report = coordinator
        .run(&CategoryRequest::new("new_releases"))
        .await
        .unwrap();

    assert!(report.success, "errors: {:?}", report.errors);
    assert_eq!(report.pages_scraped, 3);
    assert_eq!(report.total_records, 4);

    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Beta", "Gamma", "Delta"]);

    let gamma = &report.records[2];
    assert_eq!(gamma.author, "");
    assert_eq!(gamma.price, "Rp 90.000");
    assert_eq!(gamma.availability, "Paperback");
    assert_eq!(gamma.category, "new_releases");
    assert_eq!(gamma.product_url, format!("{}/p/3/book", server.uri()));
    assert_eq!(gamma.image_url, format!("{}/img/3.jpg", server.uri()));

    let requests = server.received_requests().await.unwrap();
    let pages: Vec<Option<String>> = requests
        .iter()
        .map(|r| {
            r.url
                .query_pairs()
                .find(|(key, _)| key == "page")
                .map(|(_, value)| value.into_owned())
        })
        .collect();
    assert_eq!(pages, vec![None, Some("2".to_string()), Some("3".to_string())]);
}

#[tokio::test]
async fn test_failing_page_is_retried_then_reported() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        1,
        html(listing(&[product(1, "Alpha", None, "1")], Some(2))),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    mount_page(
        &server,
        3,
        html(listing(&[product(3, "Gamma", None, "3")], None)),
    )
    .await;

    let coordinator = RunCoordinator::new(mock_site(&server), fast_run()).unwrap();
    let report = coordinator
        .run(&CategoryRequest::new("new_releases"))
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.pages_scraped, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("page 2 "));
    assert!(report.errors[0].contains("HTTP status 500"));

    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Gamma"]);
}

#[tokio::test]
async fn test_stop_policy_ends_at_first_failure() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        1,
        html(listing(&[product(1, "Alpha", None, "1")], Some(2))),
    )
    .await;
    mount_page(&server, 2, ResponseTemplate::new(404)).await;
    Mock::given(method("GET"))
        .and(query_param("page", "3"))
        .respond_with(html(listing(&[], None)))
        .expect(0)
        .mount(&server)
        .await;

    let run = RunConfig {
        failure_policy: FailurePolicy::Stop,
        max_retries: 0,
        ..fast_run()
    };
    let coordinator = RunCoordinator::new(mock_site(&server), run).unwrap();
    let report = coordinator
        .run(&CategoryRequest::new("new_releases"))
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.pages_scraped, 1);
    assert_eq!(report.total_records, 1);
}

#[tokio::test]
async fn test_max_pages_caps_endless_pagination() {
    let server = MockServer::start().await;

    // Every page claims a next page
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(html(listing(&[product(1, "Loop", None, "1")], Some(2))))
        .mount(&server)
        .await;

    let run = RunConfig {
        max_pages: 2,
        ..fast_run()
    };
    let coordinator = RunCoordinator::new(mock_site(&server), run).unwrap();
    let report = coordinator
        .run(&CategoryRequest::new("new_releases"))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.pages_scraped, 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_multiple_categories_written_to_disk() {
    let server = MockServer::start().await;

    for anl in ["103", "104"] {
        Mock::given(method("GET"))
            .and(path("/index.php"))
            .and(query_param("anl", anl))
            .respond_with(html(listing(
                &[product(anl.parse().unwrap(), &format!("Book {}", anl), None, "1")],
                None,
            )))
            .mount(&server)
            .await;
    }

    let coordinator = RunCoordinator::new(mock_site(&server), fast_run()).unwrap();
    let reports = coordinator
        .run_multiple(&CategoryRequest::parse_list("new_releases,bestsellers"))
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].category, "new_releases");
    assert_eq!(reports[0].records[0].title, "Book 103");
    assert_eq!(reports[1].category, "bestsellers");
    assert_eq!(reports[1].records[0].title, "Book 104");

    let dir = TempDir::new().unwrap();
    let output = OutputConfig {
        format: OutputFormat::Both,
        directory: dir.path().to_string_lossy().into_owned(),
    };
    for report in &reports {
        let paths = write_report(report, &output).unwrap();
        assert_eq!(paths.len(), 2);
        for path in paths {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(&format!("periplus_{}_", report.category)));
        }
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
}

#[tokio::test]
async fn test_config_file_drives_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shop"))
        .and(query_param("cat", "fiction-7"))
        .respond_with(html(
            r#"<html><body>
                 <article class="item"><h2>Solo</h2><b class="cost">$5</b><a href="/items/solo">more</a></article>
               </body></html>"#
                .to_string(),
        ))
        .mount(&server)
        .await;

    let toml = format!(
        r#"
[site]
name = "tiny"
base-url = "{}/shop"
pagination-selector = "a.next"
category-key = "cat"

[site.selectors]
product_container = "article.item"
title = "h2"
author = ".by"
price = ".cost"
image = "img"
link = "a"
availability = ".stock"

[site.categories]
fiction = "fiction-7"

[run]
delay-ms = 10
max-retries = 0
"#,
        server.uri()
    );
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = load_config(file.path()).unwrap();
    let coordinator = RunCoordinator::new(config.site, config.run).unwrap();
    let report = coordinator.run(&CategoryRequest::new("fiction")).await.unwrap();

    assert!(report.success);
    assert_eq!(report.site_name, "tiny");
    assert_eq!(report.total_records, 1);
    assert_eq!(report.records[0].price, "$5");
    assert_eq!(report.records[0].product_url, format!("{}/items/solo", server.uri()));
}
