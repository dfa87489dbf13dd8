//! Report writer trait and output errors

use crate::crawler::RunReport;
use std::io::Write;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for serializing a run report into one output format
pub trait ReportWriter {
    /// File extension, without the dot
    fn extension(&self) -> &'static str;

    /// Returns false if this format has nothing to write for the report
    fn accepts(&self, _report: &RunReport) -> bool {
        true
    }

    /// Serializes the report
    ///
    /// # Arguments
    ///
    /// * `report` - The report to serialize
    /// * `out` - Destination of the serialized bytes
    fn write(&self, report: &RunReport, out: &mut dyn Write) -> OutputResult<()>;
}
