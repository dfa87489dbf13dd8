//! CSV report output
//!
//! One row per record under a fixed header. Cells containing the separator, a
//! quote or a line break are quoted, with embedded quotes doubled.

use crate::crawler::{Record, RunReport};
use crate::output::traits::{OutputResult, ReportWriter};
use chrono::SecondsFormat;
use std::io::{self, Write};

/// Column order of the CSV output
pub const CSV_COLUMNS: [&str; 8] = [
    "title",
    "author",
    "price",
    "image_url",
    "product_url",
    "availability",
    "category",
    "scraped_at",
];

const SEPARATOR: char = ',';

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvWriter;

impl ReportWriter for CsvWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn accepts(&self, report: &RunReport) -> bool {
        !report.records.is_empty()
    }

    fn write(&self, report: &RunReport, out: &mut dyn Write) -> OutputResult<()> {
        write_row(&mut *out, &CSV_COLUMNS)?;
        for record in &report.records {
            let scraped_at = record.scraped_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
            write_row(&mut *out, &record_cells(record, &scraped_at))?;
        }
        Ok(())
    }
}

fn record_cells<'a>(record: &'a Record, scraped_at: &'a str) -> [&'a str; 8] {
    [
        record.title.as_str(),
        record.author.as_str(),
        record.price.as_str(),
        record.image_url.as_str(),
        record.product_url.as_str(),
        record.availability.as_str(),
        record.category.as_str(),
        scraped_at,
    ]
}

fn needs_quotes(cell: &str) -> bool {
    cell.contains(SEPARATOR) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
}

fn write_row<W: Write>(mut w: W, row: &[&str]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{}", SEPARATOR)?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}
