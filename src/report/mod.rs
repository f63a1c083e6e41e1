//! Run report generation.
//!
//! Each batch run can emit a report of what it read, indexed, and
//! wrote, in Markdown or JSON.

use crate::models::ApplyOutcome;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata about one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    /// Tool version that produced the report.
    pub tool_version: String,
    /// Pipeline stage that ran (overlap, prepare, split, rename).
    pub stage: String,
    /// Date and time of the run.
    pub run_date: DateTime<Utc>,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
    /// Intersection table path, for overlap runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersections: Option<String>,
    /// Input parcel table path.
    pub parcels: String,
    /// Output path or directory.
    pub output: String,
}

/// Summary counts for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Intersection rows read.
    pub rows_read: usize,
    /// Zones with at least one qualifying class.
    pub zones_indexed: usize,
    /// (zone, class) entries kept after thresholding.
    pub classes_kept: usize,
    /// Threshold the run used.
    pub threshold: f64,
    /// Records written to the target store.
    pub records_updated: usize,
    /// Records written with an empty designation.
    pub records_empty: usize,
    /// Records with a null or empty zone key.
    pub records_missing_key: usize,
    /// Zone keys skipped because their designation overflowed.
    pub overflow_skipped: Vec<String>,
}

impl RunSummary {
    /// Folds a write-back outcome into the summary.
    pub fn absorb(&mut self, outcome: &ApplyOutcome) {
        self.records_updated = outcome.records_updated;
        self.records_empty = outcome.records_empty;
        self.records_missing_key = outcome.records_missing_key;
        self.overflow_skipped = outcome
            .skipped
            .iter()
            .map(|key| key.to_string())
            .collect();
    }
}

/// The complete run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub summary: RunSummary,
}

/// Generates a Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# ParcelPrep Report\n\n");

    output.push_str("## Metadata\n\n");
    output.push_str(&format!("- **Stage:** {}\n", report.metadata.stage));
    output.push_str(&format!(
        "- **Run Date:** {}\n",
        report.metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("- **Tool Version:** {}\n", report.metadata.tool_version));
    if let Some(ref intersections) = report.metadata.intersections {
        output.push_str(&format!("- **Intersections:** {}\n", intersections));
    }
    output.push_str(&format!("- **Parcels:** {}\n", report.metadata.parcels));
    output.push_str(&format!("- **Output:** {}\n", report.metadata.output));
    output.push_str(&format!(
        "- **Duration:** {:.1}s\n\n",
        report.metadata.duration_seconds
    ));

    let summary = &report.summary;
    output.push_str("## Summary\n\n");
    output.push_str(&format!("- **Intersection Rows Read:** {}\n", summary.rows_read));
    output.push_str(&format!("- **Threshold:** {:.1}%\n", summary.threshold));
    output.push_str(&format!("- **Zones Indexed:** {}\n", summary.zones_indexed));
    output.push_str(&format!("- **Class Entries Kept:** {}\n", summary.classes_kept));
    output.push_str(&format!("- **Records Updated:** {}\n", summary.records_updated));
    output.push_str(&format!(
        "- **Records With Empty Designation:** {}\n",
        summary.records_empty
    ));
    if summary.records_missing_key > 0 {
        output.push_str(&format!(
            "- **Records Missing a Zone Key:** {}\n",
            summary.records_missing_key
        ));
    }
    output.push('\n');

    if !summary.overflow_skipped.is_empty() {
        output.push_str("## Skipped Records (Designation Overflow)\n\n");
        for key in &summary.overflow_skipped {
            output.push_str(&format!("- `{}`\n", key));
        }
        output.push('\n');
    }

    output.push_str("---\n\n*Generated by ParcelPrep*\n");

    output
}

/// Generates a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")
}
