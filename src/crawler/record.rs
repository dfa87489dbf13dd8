//! Records, page outcomes, and run reports
//!
//! `Record` and `RunReport` serialize with the field names external consumers
//! rely on (`siteName`, `imageURL`, ...); timestamps serialize as ISO-8601.

use crate::ScrapeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extracted product listing
///
/// Fields whose selector matched nothing are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub author: String,

    /// Raw price text; currency is not parsed
    pub price: String,

    #[serde(rename = "imageURL")]
    pub image_url: String,

    #[serde(rename = "productURL")]
    pub product_url: String,

    pub availability: String,

    /// Category name the record was scraped under
    pub category: String,

    #[serde(rename = "scrapedAt")]
    pub scraped_at: DateTime<Utc>,
}

/// The result of fetching and parsing exactly one listing page
#[derive(Debug)]
pub struct PageOutcome {
    /// 1-based page number
    pub page_number: u32,

    /// URL the page was fetched from
    pub url: String,

    /// Records in page order
    pub records: Vec<Record>,

    /// Absolute URL of the following page, if the page links one
    pub next_page_url: Option<String>,

    /// Set when the page failed after exhausting retries
    pub error: Option<ScrapeError>,
}

impl PageOutcome {
    /// Creates the outcome of a successfully parsed page
    pub fn parsed(
        page_number: u32,
        url: impl Into<String>,
        records: Vec<Record>,
        next_page_url: Option<String>,
    ) -> Self {
        Self {
            page_number,
            url: url.into(),
            records,
            next_page_url,
            error: None,
        }
    }

    /// Creates the outcome of a page that failed irrecoverably
    pub fn failed(page_number: u32, url: impl Into<String>, error: ScrapeError) -> Self {
        Self {
            page_number,
            url: url.into(),
            records: Vec::new(),
            next_page_url: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Human-readable error line for the run report
    pub fn error_description(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|e| format!("page {} ({}): {}", self.page_number, self.url, e))
    }
}

/// Final report of one category run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub site_name: String,
    pub category: String,
    pub total_records: usize,

    /// Pages fetched and parsed successfully, including pages without records
    pub pages_scraped: u32,

    /// Records in page order, then in-page order
    pub records: Vec<Record>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// True iff no page failed after exhausting retries
    pub success: bool,

    /// One description per page that failed irrecoverably
    pub errors: Vec<String>,
}

impl RunReport {
    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ParseError;
    use chrono::TimeZone;

    fn sample_record() -> Record {
        Record {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            price: "Rp 150.000".to_string(),
            image_url: "https://example.com/dune.jpg".to_string(),
            product_url: "https://example.com/p/dune".to_string(),
            availability: "Paperback".to_string(),
            category: "fiction".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_record_json_field_names() {
        let value = serde_json::to_value(sample_record()).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "title",
            "author",
            "price",
            "imageURL",
            "productURL",
            "availability",
            "category",
            "scrapedAt",
        ] {
            assert!(object.contains_key(key), "missing key {}", key);
        }
        assert_eq!(object.len(), 8);
        assert_eq!(object["scrapedAt"], "2024-01-02T03:04:05Z");
    }

    #[test]
    fn test_report_json_field_names() {
        let started = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let report = RunReport {
            site_name: "periplus".to_string(),
            category: "fiction".to_string(),
            total_records: 1,
            pages_scraped: 1,
            records: vec![sample_record()],
            started_at: started,
            completed_at: started + chrono::Duration::seconds(3),
            success: true,
            errors: vec![],
        };

        let value = serde_json::to_value(&report).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "siteName",
            "category",
            "totalRecords",
            "pagesScraped",
            "records",
            "startedAt",
            "completedAt",
            "success",
            "errors",
        ] {
            assert!(object.contains_key(key), "missing key {}", key);
        }
        assert_eq!(report.duration(), chrono::Duration::seconds(3));
    }

    #[test]
    fn test_failed_outcome_description() {
        let outcome = PageOutcome::failed(
            2,
            "https://example.com/?page=2",
            ScrapeError::Parse(ParseError::MalformedMarkup("no markup".to_string())),
        );

        assert!(!outcome.is_success());
        assert!(outcome.records.is_empty());
        let description = outcome.error_description().unwrap();
        assert!(description.starts_with("page 2 (https://example.com/?page=2)"));
    }

    #[test]
    fn test_parsed_outcome_has_no_error() {
        let outcome = PageOutcome::parsed(1, "https://example.com/", vec![sample_record()], None);

        assert!(outcome.is_success());
        assert!(outcome.error_description().is_none());
    }
}
