//! Tabular record stores.
//!
//! The external GIS feature store is modeled as a keyed tabular
//! capability so the aggregation core can be exercised against an
//! in-memory backend or a CSV-backed one without the real engine.

pub mod csvio;
pub mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

/// Errors raised by record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field already exists: {0}")]
    DuplicateField(String),

    #[error("value of {len} characters exceeds the {width}-character width of field {field}")]
    WidthExceeded {
        field: String,
        width: usize,
        len: usize,
    },

    #[error("field {field} cannot hold value {value:?}")]
    TypeMismatch { field: String, value: String },

    #[error("row {0} is out of bounds")]
    RowOutOfBounds(usize),

    #[error("row has {got} values but the store has {expected} fields")]
    ArityMismatch { expected: usize, got: usize },
}

/// Type of a store column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Text column, optionally bounded to a declared character width.
    Text { width: Option<usize> },
    /// Integer column.
    Integer,
}

/// Declaration of a named, typed store column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSchema {
    /// Text field with a declared maximum character width.
    pub fn text(name: &str, width: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text { width: Some(width) },
        }
    }

    /// Text field with no declared width.
    pub fn unbounded_text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text { width: None },
        }
    }

    /// Integer field.
    pub fn integer(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Integer,
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
}

impl FieldValue {
    /// Renders the value as text, `None` for null.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Integer(n) => Some(n.to_string()),
        }
    }
}

/// Capability interface over a keyed tabular feature store.
///
/// Mirrors the operations the batch stages need from the external
/// engine: typed column management, distinct values, equality
/// selection, and per-row reads and updates.
pub trait RecordStore {
    /// Number of records in the store.
    fn record_count(&self) -> usize;

    /// Names of all fields, in column order.
    fn field_names(&self) -> Vec<String>;

    /// Returns true if a field with this name exists.
    fn has_field(&self, name: &str) -> bool;

    /// Declared character width of a text field, if bounded.
    fn field_width(&self, name: &str) -> Option<usize>;

    /// Adds a new typed column, null for every existing record.
    fn add_field(&mut self, schema: FieldSchema) -> Result<(), StoreError>;

    /// Removes a column and its values from every record.
    fn drop_field(&mut self, name: &str) -> Result<(), StoreError>;

    /// Renames a column, keeping its type and values.
    fn rename_field(&mut self, from: &str, to: &str) -> Result<(), StoreError>;

    /// Distinct non-null values of a field, in first-seen order.
    fn distinct_values(&self, field: &str) -> Result<Vec<String>, StoreError>;

    /// Row indexes whose field equals the given text value.
    fn select_equal(&self, field: &str, value: &str) -> Result<Vec<usize>, StoreError>;

    /// Text view of an entire column, one entry per record.
    fn read_column(&self, field: &str) -> Result<Vec<Option<String>>, StoreError>;

    /// Text view of a single cell.
    fn read_row(&self, row: usize, field: &str) -> Result<Option<String>, StoreError>;

    /// Writes a single cell, enforcing the field's type and width.
    fn write_row(&mut self, row: usize, field: &str, value: FieldValue) -> Result<(), StoreError>;
}
