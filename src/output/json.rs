//! JSON report output
//!
//! The whole report is written as one pretty-printed object; the field names
//! come from the serde attributes on [`RunReport`] and [`Record`](crate::Record).

use crate::crawler::RunReport;
use crate::output::traits::{OutputResult, ReportWriter};
use std::io::Write;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWriter;

impl ReportWriter for JsonWriter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write(&self, report: &RunReport, out: &mut dyn Write) -> OutputResult<()> {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)?;
        Ok(())
    }
}
