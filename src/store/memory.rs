//! In-memory record store.
//!
//! Backs both the unit tests and the CSV store: a CSV file is loaded
//! into a `MemoryStore`, mutated by the batch stages, and written back
//! out.

use super::{FieldKind, FieldSchema, FieldValue, RecordStore, StoreError};
use std::collections::HashSet;

/// Column-schema'd table held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    fields: Vec<FieldSchema>,
    rows: Vec<Vec<FieldValue>>,
}

impl MemoryStore {
    /// Creates an empty store with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given column schemas.
    pub fn with_fields(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    /// Appends a record. The row must have one value per field, each
    /// compatible with its column's type and width.
    pub fn push_row(&mut self, row: Vec<FieldValue>) -> Result<(), StoreError> {
        if row.len() != self.fields.len() {
            return Err(StoreError::ArityMismatch {
                expected: self.fields.len(),
                got: row.len(),
            });
        }
        for (schema, value) in self.fields.iter().zip(&row) {
            validate(schema, value)?;
        }
        self.rows.push(row);
        Ok(())
    }

    /// Copies the given rows into a new store with the same schema.
    pub fn select_into(&self, rows: &[usize]) -> Result<MemoryStore, StoreError> {
        let mut out = MemoryStore::with_fields(self.fields.clone());
        for &row in rows {
            let values = self
                .rows
                .get(row)
                .ok_or(StoreError::RowOutOfBounds(row))?;
            out.rows.push(values.clone());
        }
        Ok(out)
    }

    /// Column schemas, in column order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    fn field_index(&self, name: &str) -> Result<usize, StoreError> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| StoreError::UnknownField(name.to_string()))
    }
}

/// Checks a value against a column's declared type and width.
fn validate(schema: &FieldSchema, value: &FieldValue) -> Result<(), StoreError> {
    match (&schema.kind, value) {
        (_, FieldValue::Null) => Ok(()),
        (FieldKind::Text { width }, FieldValue::Text(s)) => {
            let len = s.chars().count();
            match width {
                Some(width) if len > *width => Err(StoreError::WidthExceeded {
                    field: schema.name.clone(),
                    width: *width,
                    len,
                }),
                _ => Ok(()),
            }
        }
        (FieldKind::Integer, FieldValue::Integer(_)) => Ok(()),
        (_, other) => Err(StoreError::TypeMismatch {
            field: schema.name.clone(),
            value: other.as_text().unwrap_or_default(),
        }),
    }
}

impl RecordStore for MemoryStore {
    fn record_count(&self) -> usize {
        self.rows.len()
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    fn field_width(&self, name: &str) -> Option<usize> {
        self.fields.iter().find(|f| f.name == name).and_then(|f| {
            match f.kind {
                FieldKind::Text { width } => width,
                FieldKind::Integer => None,
            }
        })
    }

    fn add_field(&mut self, schema: FieldSchema) -> Result<(), StoreError> {
        if self.has_field(&schema.name) {
            return Err(StoreError::DuplicateField(schema.name));
        }
        self.fields.push(schema);
        for row in &mut self.rows {
            row.push(FieldValue::Null);
        }
        Ok(())
    }

    fn drop_field(&mut self, name: &str) -> Result<(), StoreError> {
        let index = self.field_index(name)?;
        self.fields.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        Ok(())
    }

    fn rename_field(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        if self.has_field(to) {
            return Err(StoreError::DuplicateField(to.to_string()));
        }
        let index = self.field_index(from)?;
        self.fields[index].name = to.to_string();
        Ok(())
    }

    fn distinct_values(&self, field: &str) -> Result<Vec<String>, StoreError> {
        let index = self.field_index(field)?;
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for row in &self.rows {
            if let Some(text) = row[index].as_text() {
                if seen.insert(text.clone()) {
                    values.push(text);
                }
            }
        }
        Ok(values)
    }

    fn select_equal(&self, field: &str, value: &str) -> Result<Vec<usize>, StoreError> {
        let index = self.field_index(field)?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row[index].as_text().as_deref() == Some(value))
            .map(|(i, _)| i)
            .collect())
    }

    fn read_column(&self, field: &str) -> Result<Vec<Option<String>>, StoreError> {
        let index = self.field_index(field)?;
        Ok(self.rows.iter().map(|row| row[index].as_text()).collect())
    }

    fn read_row(&self, row: usize, field: &str) -> Result<Option<String>, StoreError> {
        let index = self.field_index(field)?;
        let values = self.rows.get(row).ok_or(StoreError::RowOutOfBounds(row))?;
        Ok(values[index].as_text())
    }

    fn write_row(&mut self, row: usize, field: &str, value: FieldValue) -> Result<(), StoreError> {
        let index = self.field_index(field)?;
        validate(&self.fields[index], &value)?;
        let values = self
            .rows
            .get_mut(row)
            .ok_or(StoreError::RowOutOfBounds(row))?;
        values[index] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcel_store() -> MemoryStore {
        let mut store = MemoryStore::with_fields(vec![
            FieldSchema::unbounded_text("parcel_id"),
            FieldSchema::unbounded_text("county_name"),
        ]);
        store
            .push_row(vec![
                FieldValue::Text("P1".to_string()),
                FieldValue::Text("Alameda County".to_string()),
            ])
            .unwrap();
        store
            .push_row(vec![
                FieldValue::Text("P2".to_string()),
                FieldValue::Text("Kern County".to_string()),
            ])
            .unwrap();
        store
            .push_row(vec![
                FieldValue::Text("P3".to_string()),
                FieldValue::Text("Alameda County".to_string()),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_add_and_drop_field() {
        let mut store = parcel_store();
        store.add_field(FieldSchema::integer("zoning_count")).unwrap();
        assert!(store.has_field("zoning_count"));
        assert_eq!(store.read_row(0, "zoning_count").unwrap(), None);

        store.drop_field("zoning_count").unwrap();
        assert!(!store.has_field("zoning_count"));
    }

    #[test]
    fn test_add_duplicate_field_fails() {
        let mut store = parcel_store();
        let err = store.add_field(FieldSchema::integer("parcel_id"));
        assert!(matches!(err, Err(StoreError::DuplicateField(_))));
    }

    #[test]
    fn test_width_enforced_on_write() {
        let mut store = parcel_store();
        store.add_field(FieldSchema::text("zoning", 5)).unwrap();

        store
            .write_row(0, "zoning", FieldValue::Text("R1".to_string()))
            .unwrap();
        let err = store.write_row(0, "zoning", FieldValue::Text("too long".to_string()));
        assert!(matches!(err, Err(StoreError::WidthExceeded { width: 5, .. })));
    }

    #[test]
    fn test_width_counts_characters_not_bytes() {
        let mut store = MemoryStore::with_fields(vec![FieldSchema::text("name", 4)]);
        store
            .push_row(vec![FieldValue::Text("Ojai".to_string())])
            .unwrap();
        // Four characters even though the encoding is longer than four bytes.
        store
            .write_row(0, "name", FieldValue::Text("Баха".to_string()))
            .unwrap();
    }

    #[test]
    fn test_type_mismatch() {
        let mut store = parcel_store();
        store.add_field(FieldSchema::integer("zoning_count")).unwrap();
        let err = store.write_row(0, "zoning_count", FieldValue::Text("3".to_string()));
        assert!(matches!(err, Err(StoreError::TypeMismatch { .. })));
    }

    #[test]
    fn test_distinct_values_first_seen_order() {
        let store = parcel_store();
        assert_eq!(
            store.distinct_values("county_name").unwrap(),
            vec!["Alameda County".to_string(), "Kern County".to_string()]
        );
    }

    #[test]
    fn test_select_equal_and_select_into() {
        let store = parcel_store();
        let rows = store.select_equal("county_name", "Alameda County").unwrap();
        assert_eq!(rows, vec![0, 2]);

        let subset = store.select_into(&rows).unwrap();
        assert_eq!(subset.record_count(), 2);
        assert_eq!(subset.read_row(1, "parcel_id").unwrap(), Some("P3".to_string()));
    }

    #[test]
    fn test_rename_field() {
        let mut store = parcel_store();
        store.rename_field("county_name", "COUNTYNAME").unwrap();
        assert!(store.has_field("COUNTYNAME"));
        assert!(!store.has_field("county_name"));
        assert!(matches!(
            store.rename_field("parcel_id", "COUNTYNAME"),
            Err(StoreError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_unknown_field() {
        let store = parcel_store();
        assert!(matches!(
            store.read_column("nope"),
            Err(StoreError::UnknownField(_))
        ));
    }
}
