//! Result aggregation
//!
//! Page outcomes may arrive in any order; the aggregator keys them by page
//! number and restores page order when the report is built.

use crate::crawler::record::{PageOutcome, RunReport};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Merges per-page outcomes of one category run into a [`RunReport`]
#[derive(Debug)]
pub struct ResultAggregator {
    site_name: String,
    category: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,

    /// Outcomes keyed by page number
    outcomes: BTreeMap<u32, PageOutcome>,

    /// Failures not attributable to a single page
    run_errors: Vec<String>,
}

impl ResultAggregator {
    pub fn new(
        site_name: impl Into<String>,
        category: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            category: category.into(),
            started_at,
            completed_at: None,
            outcomes: BTreeMap::new(),
            run_errors: Vec::new(),
        }
    }

    /// Records one page outcome
    ///
    /// A page number is only ever accepted once; a second outcome for the same
    /// page is discarded.
    pub fn ingest(&mut self, outcome: PageOutcome) {
        if self.outcomes.contains_key(&outcome.page_number) {
            tracing::warn!(
                "Ignoring duplicate outcome for page {} of '{}'",
                outcome.page_number,
                self.category
            );
            return;
        }

        tracing::trace!(
            "Ingested page {} of '{}' ({} records, success: {})",
            outcome.page_number,
            self.category,
            outcome.records.len(),
            outcome.is_success()
        );
        self.outcomes.insert(outcome.page_number, outcome);
    }

    /// Records a failure of the run itself (e.g. a crashed walk)
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.run_errors.push(message.into());
    }

    /// Marks the run as finished at the given instant
    pub fn close(&mut self, completed_at: DateTime<Utc>) {
        self.completed_at = Some(completed_at);
    }

    /// Number of pages ingested so far, failed ones included
    pub fn pages_ingested(&self) -> usize {
        self.outcomes.len()
    }

    /// Builds the report
    ///
    /// This only reads the aggregator, so repeated calls return identical
    /// reports. Call it once the walk has finished and [`close`](Self::close)
    /// has been called.
    pub fn finalize(&self) -> RunReport {
        if self.completed_at.is_none() {
            tracing::warn!(
                "Finalizing run for '{}' before it was closed",
                self.category
            );
        }

        let mut records = Vec::new();
        let mut errors = Vec::new();
        let mut pages_scraped = 0;

        // BTreeMap iteration is in page order
        for outcome in self.outcomes.values() {
            match outcome.error_description() {
                Some(description) => errors.push(description),
                None => {
                    pages_scraped += 1;
                    records.extend(outcome.records.iter().cloned());
                }
            }
        }
        errors.extend(self.run_errors.iter().cloned());

        RunReport {
            site_name: self.site_name.clone(),
            category: self.category.clone(),
            total_records: records.len(),
            pages_scraped,
            records,
            started_at: self.started_at,
            completed_at: self.completed_at.unwrap_or(self.started_at),
            success: errors.is_empty(),
            errors,
        }
    }
}
