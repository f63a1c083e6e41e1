//! Data models for parcel preparation.
//!
//! This module contains the core data structures used throughout the
//! application for representing zones, overlap rows, and aggregation
//! results.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Opaque identifier for one spatial zone (e.g. a parcel).
///
/// Keys must be stable across the intersection table and the target
/// record store. An empty key marks a record that cannot participate
/// in aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneKey(String);

impl ZoneKey {
    /// Creates a zone key from a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ZoneKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// One row of the external overlap table.
///
/// Produced by a spatial intersection engine: one row per
/// (zone, overlapping class) pair, with the percentage of the zone's
/// area covered by that class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionRow {
    /// Zone the overlap was measured against.
    pub zone_key: ZoneKey,
    /// Categorical label overlapping the zone (e.g. a zoning code).
    pub class_value: String,
    /// Percent of the zone's area covered by the class, 0 to 100.
    pub percent_cover: f64,
}

impl IntersectionRow {
    /// Creates a row from its three parts.
    pub fn new(
        zone_key: impl Into<String>,
        class_value: impl Into<String>,
        percent_cover: f64,
    ) -> Self {
        Self {
            zone_key: ZoneKey::new(zone_key),
            class_value: class_value.into(),
            percent_cover,
        }
    }
}

/// Per-zone mapping from class value to rounded percent cover.
///
/// Holds only the classes that met the threshold. Entries are keyed in
/// class-value order so the encoded form is deterministic. Inserting a
/// class that is already present overwrites it (last-seen wins).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlapSet {
    entries: BTreeMap<String, f64>,
}

impl OverlapSet {
    /// Inserts a class with its rounded percent cover.
    pub fn insert(&mut self, class_value: String, percent_cover: f64) {
        self.entries.insert(class_value, percent_cover);
    }

    /// Returns the percent cover recorded for a class, if present.
    pub fn get(&self, class_value: &str) -> Option<f64> {
        self.entries.get(class_value).copied()
    }

    /// Number of distinct classes in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no class met the threshold.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over (class, percent) entries in class-value order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.entries.iter()
    }

    /// Encodes the set as a bounded-width text attribute.
    ///
    /// The encoding is `{'C1': 12.0, 'R1': 45.2}` with entries ordered
    /// by class value and exactly one decimal digit per percentage.
    /// An empty set encodes as `{}`, never as an absent value.
    pub fn encode(&self) -> String {
        if self.entries.is_empty() {
            return "{}".to_string();
        }

        let pairs: Vec<String> = self
            .entries
            .iter()
            .map(|(class, pct)| format!("'{}': {:.1}", class, pct))
            .collect();

        format!("{{{}}}", pairs.join(", "))
    }
}

/// Typed mapping from zone key to its qualifying overlap set.
///
/// Zones with no class at or above the threshold are absent from the
/// index, not present with an empty set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlapIndex {
    zones: HashMap<ZoneKey, OverlapSet>,
}

impl OverlapIndex {
    /// Returns the overlap set for a zone, if any class qualified.
    pub fn get(&self, zone_key: &ZoneKey) -> Option<&OverlapSet> {
        self.zones.get(zone_key)
    }

    /// Returns a mutable overlap set for a zone, creating it if absent.
    pub fn entry(&mut self, zone_key: ZoneKey) -> &mut OverlapSet {
        self.zones.entry(zone_key).or_default()
    }

    /// Number of zones with at least one qualifying class.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Total number of (zone, class) entries across the index.
    pub fn entry_count(&self) -> usize {
        self.zones.values().map(OverlapSet::len).sum()
    }

    /// Returns true if no zone qualified.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Iterates over (zone, set) pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&ZoneKey, &OverlapSet)> {
        self.zones.iter()
    }
}

/// Field names and widths the aggregator uses on the target store.
#[derive(Debug, Clone)]
pub struct OverlapFields {
    /// Field holding the zone key on each target record.
    pub key_field: String,
    /// Bounded-width text field receiving the encoded overlap set.
    pub designation_field: String,
    /// Integer field receiving the number of qualifying classes.
    pub count_field: String,
    /// Declared character width of the designation field.
    pub designation_width: usize,
}

/// What to do when an encoded designation exceeds the field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Abort the run, reporting every offending zone key (default).
    #[default]
    Fail,
    /// Skip the offending records, write the rest, and report them.
    Skip,
}

/// Outcome of one write-back pass over the target store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyOutcome {
    /// Records written (including empty designations).
    pub records_updated: usize,
    /// Records written with an empty designation and count 0.
    pub records_empty: usize,
    /// Records whose zone key was null or empty.
    pub records_missing_key: usize,
    /// Zone keys skipped because their designation overflowed.
    pub skipped: Vec<ZoneKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_set() {
        let set = OverlapSet::default();
        assert_eq!(set.encode(), "{}");
    }

    #[test]
    fn test_encode_orders_by_class() {
        let mut set = OverlapSet::default();
        set.insert("R1".to_string(), 45.2);
        set.insert("C1".to_string(), 12.0);
        assert_eq!(set.encode(), "{'C1': 12.0, 'R1': 45.2}");
    }

    #[test]
    fn test_encode_one_decimal_digit() {
        let mut set = OverlapSet::default();
        set.insert("R1".to_string(), 100.0);
        assert_eq!(set.encode(), "{'R1': 100.0}");
    }

    #[test]
    fn test_insert_overwrites_class() {
        let mut set = OverlapSet::default();
        set.insert("R1".to_string(), 10.0);
        set.insert("R1".to_string(), 20.0);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("R1"), Some(20.0));
    }

    #[test]
    fn test_index_absent_zone() {
        let index = OverlapIndex::default();
        assert!(index.get(&ZoneKey::from("P1")).is_none());
        assert_eq!(index.zone_count(), 0);
    }

    #[test]
    fn test_index_entry_counts() {
        let mut index = OverlapIndex::default();
        index.entry(ZoneKey::from("P1")).insert("R1".to_string(), 45.2);
        index.entry(ZoneKey::from("P1")).insert("R2".to_string(), 30.0);
        index.entry(ZoneKey::from("P2")).insert("C1".to_string(), 99.9);
        assert_eq!(index.zone_count(), 2);
        assert_eq!(index.entry_count(), 3);
    }

    #[test]
    fn test_zone_key_display() {
        let key = ZoneKey::from("06001_123_456");
        assert_eq!(key.to_string(), "06001_123_456");
        assert!(!key.is_empty());
        assert!(ZoneKey::from("").is_empty());
    }
}
