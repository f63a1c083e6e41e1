//! CSV backing for record stores.
//!
//! Loads a CSV table into a [`MemoryStore`] and writes a mutated store
//! back out. All loaded columns are unbounded text; bounded or integer
//! columns only appear when a batch stage adds them.

use super::{FieldSchema, FieldValue, MemoryStore, RecordStore};
use anyhow::{Context, Result};
use std::path::Path;

/// Loads a CSV file into a memory store.
///
/// Empty cells load as null so missing-key handling sees them the same
/// way it would see a null attribute in a feature store.
pub fn load_csv(path: &Path) -> Result<MemoryStore> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read headers from {}", path.display()))?
        .clone();

    let fields: Vec<FieldSchema> = headers
        .iter()
        .map(FieldSchema::unbounded_text)
        .collect();
    let mut store = MemoryStore::with_fields(fields);

    for (line, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read {} line {}", path.display(), line + 2))?;
        let row: Vec<FieldValue> = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::Text(cell.to_string())
                }
            })
            .collect();
        store
            .push_row(row)
            .with_context(|| format!("Malformed row at {} line {}", path.display(), line + 2))?;
    }

    Ok(store)
}

/// Writes a store to a CSV file, nulls as empty cells.
pub fn save_csv(store: &MemoryStore, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer
        .write_record(store.field_names())
        .context("Failed to write CSV header")?;

    let columns: Vec<Vec<Option<String>>> = store
        .field_names()
        .iter()
        .map(|name| store.read_column(name))
        .collect::<Result<_, _>>()?;

    for row in 0..store.record_count() {
        let record: Vec<String> = columns
            .iter()
            .map(|column| column[row].clone().unwrap_or_default())
            .collect();
        writer
            .write_record(&record)
            .with_context(|| format!("Failed to write row {} to {}", row, path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("parcels.csv");
        std::fs::write(&input, "parcel_id,county_name\nP1,Alameda County\nP2,\n").unwrap();

        let store = load_csv(&input).unwrap();
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.read_row(0, "parcel_id").unwrap(), Some("P1".to_string()));
        // Empty cell loads as null.
        assert_eq!(store.read_row(1, "county_name").unwrap(), None);

        let output = dir.path().join("out.csv");
        save_csv(&store, &output).unwrap();
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "parcel_id,county_name\nP1,Alameda County\nP2,\n");
    }

    #[test]
    fn test_saved_store_keeps_added_fields() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("parcels.csv");
        std::fs::write(&input, "parcel_id\nP1\n").unwrap();

        let mut store = load_csv(&input).unwrap();
        store.add_field(FieldSchema::integer("zoning_count")).unwrap();
        store.write_row(0, "zoning_count", FieldValue::Integer(2)).unwrap();

        let output = dir.path().join("out.csv");
        save_csv(&store, &output).unwrap();
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "parcel_id,zoning_count\nP1,2\n");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_csv(Path::new("/nonexistent/parcels.csv"));
        assert!(err.is_err());
    }
}
