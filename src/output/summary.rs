//! Human-readable run summaries

use crate::crawler::RunReport;
use std::fmt::Write;

/// Number of errors listed before the rest are elided
pub const MAX_LISTED_ERRORS: usize = 5;

/// Formats a report as a short plain-text summary
pub fn format_summary(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== {} / {} ===", report.site_name, report.category);
    let _ = writeln!(out, "  Status: {}", if report.success { "success" } else { "completed with errors" });
    let _ = writeln!(out, "  Pages scraped: {}", report.pages_scraped);
    let _ = writeln!(out, "  Total records: {}", report.total_records);
    let _ = writeln!(
        out,
        "  Duration: {:.1}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );

    if !report.errors.is_empty() {
        let _ = writeln!(out, "  Errors ({}):", report.errors.len());
        for error in report.errors.iter().take(MAX_LISTED_ERRORS) {
            let _ = writeln!(out, "    - {}", error);
        }
        if report.errors.len() > MAX_LISTED_ERRORS {
            let _ = writeln!(out, "    ... and {} more", report.errors.len() - MAX_LISTED_ERRORS);
        }
    }

    out
}

/// Prints the summary to stdout
pub fn print_summary(report: &RunReport) {
    println!("{}", format_summary(report));
}

/// Formats the combined totals of several reports
pub fn format_totals(reports: &[RunReport]) -> String {
    let records: usize = reports.iter().map(|r| r.total_records).sum();
    let pages: u32 = reports.iter().map(|r| r.pages_scraped).sum();
    let failed = reports.iter().filter(|r| !r.success).count();

    let mut out = format!(
        "Total records across {} categories: {} ({} pages)",
        reports.len(),
        records,
        pages
    );
    if failed > 0 {
        let _ = write!(out, ", {} with errors", failed);
    }
    out
}
