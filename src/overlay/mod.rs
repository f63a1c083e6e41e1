//! Spatial overlap providers.
//!
//! The intersection computation itself happens in an external GIS
//! engine; this module only ingests its tabulated output as
//! `(zone, class, percent)` rows.

use crate::models::IntersectionRow;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of precomputed overlap rows for one run.
pub trait OverlapProvider {
    /// Reads the full intersection table.
    fn intersection_rows(&self) -> Result<Vec<IntersectionRow>>;
}

/// Column names in a tabulated intersection export.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    /// Column holding the zone key.
    pub zone_key: String,
    /// Column holding the overlapping class value.
    pub class_value: String,
    /// Column holding the percent cover.
    pub percent_cover: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            zone_key: "parcel_id".to_string(),
            class_value: "zoning_code".to_string(),
            percent_cover: "percentage".to_string(),
        }
    }
}

/// Reader over a CSV export of a tabulate-intersection run.
pub struct CsvIntersectionTable {
    path: PathBuf,
    columns: ColumnMap,
}

impl CsvIntersectionTable {
    /// Creates a reader for the given file and column names.
    pub fn new(path: PathBuf, columns: ColumnMap) -> Self {
        Self { path, columns }
    }
}

impl OverlapProvider for CsvIntersectionTable {
    fn intersection_rows(&self) -> Result<Vec<IntersectionRow>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read headers from {}", self.path.display()))?
            .clone();

        let zone_idx = column_index(&headers, &self.columns.zone_key, &self.path)?;
        let class_idx = column_index(&headers, &self.columns.class_value, &self.path)?;
        let percent_idx = column_index(&headers, &self.columns.percent_cover, &self.path)?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| {
                format!("Failed to read {} line {}", self.path.display(), line + 2)
            })?;

            let percent_raw = record.get(percent_idx).unwrap_or("");
            let percent_cover: f64 = percent_raw.parse().with_context(|| {
                format!(
                    "Invalid percent cover {:?} at {} line {}",
                    percent_raw,
                    self.path.display(),
                    line + 2
                )
            })?;

            rows.push(IntersectionRow::new(
                record.get(zone_idx).unwrap_or(""),
                record.get(class_idx).unwrap_or(""),
                percent_cover,
            ));
        }

        debug!("Read {} intersection rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// Finds a column by name, case-insensitively.
///
/// Intersection exports from different engines disagree on header
/// casing (PERCENTAGE vs percentage), so the match ignores case.
fn column_index(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    match headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
    {
        Some(index) => Ok(index),
        None => bail!(
            "Column {:?} not found in {} (headers: {})",
            name,
            path.display(),
            headers.iter().collect::<Vec<_>>().join(", ")
        ),
    }
}
