//! Zoning-overlap aggregation.
//!
//! This is the core of the toolchain: given the tabulated output of an
//! external spatial intersection (one row per zone/class pair with a
//! percent cover), build an index of the classes that meet a threshold
//! per zone, then write the encoded result back onto every target
//! record in a single pass.

use crate::models::{
    ApplyOutcome, IntersectionRow, OverflowPolicy, OverlapFields, OverlapIndex, OverlapSet,
    ZoneKey,
};
use crate::store::{FieldSchema, FieldValue, RecordStore, StoreError};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while building the overlap index.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("threshold must be within 0..=100, got {0}")]
    ThresholdOutOfRange(f64),

    #[error("row {row} (zone {zone}): percent cover must be within 0..=100, got {value}")]
    PercentOutOfRange { row: usize, zone: String, value: f64 },

    #[error("row {row}: empty zone key")]
    EmptyZoneKey { row: usize },
}

/// Errors raised while writing designations back to the store.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(
        "encoded designation exceeds {width} characters for {} record(s): {}",
        .offenders.len(),
        format_offenders(.offenders)
    )]
    Overflow {
        width: usize,
        offenders: Vec<ZoneKey>,
    },
}

fn format_offenders(offenders: &[ZoneKey]) -> String {
    let mut keys: Vec<&str> = offenders.iter().take(10).map(ZoneKey::as_str).collect();
    if offenders.len() > keys.len() {
        keys.push("...");
    }
    keys.join(", ")
}

/// Rounds a percent cover to one decimal digit, half-up.
///
/// Half-up is the documented policy for this toolchain; ties such as
/// 12.25 round to 12.3. Inputs are non-negative percentages, so the
/// add-then-floor form is exact for ties.
pub fn round_percent(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

/// Builds the zone-to-overlap index from intersection rows.
///
/// Percent covers are rounded before the threshold comparison and
/// before storage, and rows below the threshold are dropped entirely.
/// The comparison is inclusive: a rounded cover equal to the threshold
/// qualifies. A zone with no qualifying rows is absent from the index.
/// Duplicate (zone, class) pairs take the last-seen row, in input
/// order.
///
/// Pure over its inputs; malformed input (threshold or percent outside
/// 0..=100, empty zone key) is rejected with an error rather than
/// logged and skipped.
pub fn build_overlap_index(
    rows: &[IntersectionRow],
    threshold: f64,
) -> Result<OverlapIndex, AggregateError> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(AggregateError::ThresholdOutOfRange(threshold));
    }

    let mut index = OverlapIndex::default();

    for (row, intersection) in rows.iter().enumerate() {
        if intersection.zone_key.is_empty() {
            return Err(AggregateError::EmptyZoneKey { row });
        }
        if !(0.0..=100.0).contains(&intersection.percent_cover) {
            return Err(AggregateError::PercentOutOfRange {
                row,
                zone: intersection.zone_key.to_string(),
                value: intersection.percent_cover,
            });
        }

        let rounded = round_percent(intersection.percent_cover);
        if rounded < threshold {
            continue;
        }

        index
            .entry(intersection.zone_key.clone())
            .insert(intersection.class_value.clone(), rounded);
    }

    debug!(
        "Indexed {} zones ({} class entries) from {} rows",
        index.zone_count(),
        index.entry_count(),
        rows.len()
    );

    Ok(index)
}

/// Writes encoded overlap designations onto every record in the store.
///
/// The designation and count fields are dropped and recreated first so
/// no value from a previous run can survive, then every record is
/// visited exactly once:
///
/// - key present in the index: encoded overlap set and class count;
/// - key absent (or null/empty): `{}` and 0.
///
/// All encodings are computed and width-checked before anything is
/// written. Under [`OverflowPolicy::Fail`] any overflow aborts with the
/// complete offender list and the store untouched beyond the recreated
/// empty fields; under [`OverflowPolicy::Skip`] offending records are
/// left null and reported in the outcome.
///
/// Re-running with the same index and fields produces byte-identical
/// field contents.
pub fn apply_overlap_index(
    store: &mut dyn RecordStore,
    index: &OverlapIndex,
    fields: &OverlapFields,
    policy: OverflowPolicy,
) -> Result<ApplyOutcome, ApplyError> {
    if store.has_field(&fields.designation_field) {
        store.drop_field(&fields.designation_field)?;
    }
    if store.has_field(&fields.count_field) {
        store.drop_field(&fields.count_field)?;
    }
    store.add_field(FieldSchema::text(
        &fields.designation_field,
        fields.designation_width,
    ))?;
    store.add_field(FieldSchema::integer(&fields.count_field))?;

    let keys = store.read_column(&fields.key_field)?;

    let mut outcome = ApplyOutcome::default();
    let mut offenders: Vec<ZoneKey> = Vec::new();
    let mut updates: Vec<(usize, String, i64)> = Vec::with_capacity(keys.len());
    let empty = OverlapSet::default();

    for (row, key) in keys.iter().enumerate() {
        let zone = match key.as_deref() {
            Some(raw) if !raw.is_empty() => Some(ZoneKey::from(raw)),
            _ => None,
        };
        if zone.is_none() {
            warn!("Record {} has no {} value", row, fields.key_field);
            outcome.records_missing_key += 1;
        }

        let set = zone
            .as_ref()
            .and_then(|z| index.get(z))
            .unwrap_or(&empty);
        let encoded = set.encode();

        if encoded.chars().count() > fields.designation_width {
            // Only a non-empty set can overflow, so the zone is known here.
            offenders.push(zone.unwrap_or_else(|| ZoneKey::new("")));
            continue;
        }

        if set.is_empty() {
            outcome.records_empty += 1;
        }
        updates.push((row, encoded, set.len() as i64));
    }

    if !offenders.is_empty() {
        match policy {
            OverflowPolicy::Fail => {
                return Err(ApplyError::Overflow {
                    width: fields.designation_width,
                    offenders,
                });
            }
            OverflowPolicy::Skip => {
                warn!(
                    "Skipping {} record(s) whose designation exceeds {} characters",
                    offenders.len(),
                    fields.designation_width
                );
                outcome.skipped = offenders;
            }
        }
    }

    for (row, encoded, count) in updates {
        store.write_row(row, &fields.designation_field, FieldValue::Text(encoded))?;
        store.write_row(row, &fields.count_field, FieldValue::Integer(count))?;
        outcome.records_updated += 1;
    }

    Ok(outcome)
}
