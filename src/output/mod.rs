//! Output module for writing run reports
//!
//! This module handles:
//! - Serializing reports as JSON and CSV files
//! - Naming output files after site, category and start time
//! - Printing human-readable run summaries

mod csv;
mod json;
mod summary;
mod traits;

pub use self::csv::{CsvWriter, CSV_COLUMNS};
pub use json::JsonWriter;
pub use summary::{format_summary, format_totals, print_summary, MAX_LISTED_ERRORS};
pub use traits::{OutputError, OutputResult, ReportWriter};

use crate::config::{OutputConfig, OutputFormat};
use crate::crawler::RunReport;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Builds the file name stem `{site}_{category}_{YYYYmmdd_HHMMSS}` for a report
pub fn report_file_stem(report: &RunReport) -> String {
    format!(
        "{}_{}_{}",
        sanitize(&report.site_name),
        sanitize(&report.category),
        report.started_at.format("%Y%m%d_%H%M%S")
    )
}

/// Replaces characters that do not belong in a file name
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn writers_for(format: OutputFormat) -> Vec<Box<dyn ReportWriter>> {
    let mut writers: Vec<Box<dyn ReportWriter>> = Vec::new();
    if format.writes_json() {
        writers.push(Box::new(JsonWriter));
    }
    if format.writes_csv() {
        writers.push(Box::new(CsvWriter));
    }
    writers
}

/// Writes a report in every configured format
///
/// The output directory is created if missing. A format with nothing to write
/// (CSV for a report without records) is skipped with a warning.
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - Paths of the files written
/// * `Err(OutputError)` - Directory creation, serialization or writing failed
pub fn write_report(report: &RunReport, config: &OutputConfig) -> OutputResult<Vec<PathBuf>> {
    let directory = Path::new(&config.directory);
    fs::create_dir_all(directory)?;

    let stem = report_file_stem(report);
    let mut written = Vec::new();

    for writer in writers_for(config.format) {
        if !writer.accepts(report) {
            tracing::warn!(
                "No records for '{}'; skipping {} output",
                report.category,
                writer.extension()
            );
            continue;
        }

        let path = directory.join(format!("{}.{}", stem, writer.extension()));
        let mut file = BufWriter::new(File::create(&path)?);
        writer.write(report, &mut file)?;
        file.flush()?;

        tracing::info!("Wrote {} records to {}", report.total_records, path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::Record;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn report(records: usize) -> RunReport {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 15, 16, 17).unwrap();
        let records: Vec<Record> = (0..records)
            .map(|i| Record {
                title: format!("Book {}", i),
                author: String::new(),
                price: String::new(),
                image_url: String::new(),
                product_url: String::new(),
                availability: String::new(),
                category: "new releases".to_string(),
                scraped_at: at,
            })
            .collect();

        RunReport {
            site_name: "periplus".to_string(),
            category: "new releases".to_string(),
            total_records: records.len(),
            pages_scraped: 1,
            records,
            started_at: at,
            completed_at: at,
            success: true,
            errors: vec![],
        }
    }

    fn output(dir: &Path, format: OutputFormat) -> OutputConfig {
        OutputConfig {
            format,
            directory: dir.join("out").to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(report_file_stem(&report(0)), "periplus_new_releases_20240304_151617");
    }

    #[test]
    fn test_write_both_formats() {
        let dir = TempDir::new().unwrap();
        let config = output(dir.path(), OutputFormat::Both);

        let paths = write_report(&report(2), &config).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("periplus_new_releases_20240304_151617.json"));
        assert!(paths[1].ends_with("periplus_new_releases_20240304_151617.csv"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(json["totalRecords"], 2);

        let csv = fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_empty_report_skips_csv() {
        let dir = TempDir::new().unwrap();
        let config = output(dir.path(), OutputFormat::Both);

        let paths = write_report(&report(0), &config).unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].extension().unwrap(), "json");
    }
}
