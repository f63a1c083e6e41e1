//! Tabular preparation stages for parcel datasets.
//!
//! Covers the attribute work that happens around the overlap
//! aggregation: deriving a unique parcel id, stamping constant fields,
//! splitting a statewide table into per-county tables, and renaming
//! fields for delivery. All of it is pure attribute manipulation; any
//! geometry work stays in the external engine.

use crate::store::{FieldSchema, FieldValue, MemoryStore, RecordStore, StoreError};
use tracing::{debug, warn};

/// Default delivery renames, applied to fields that exist.
pub const DEFAULT_FIELD_RENAMES: [(&str, &str); 10] = [
    ("fips", "FIPS_CODE"),
    ("county_name", "COUNTYNAME"),
    ("fips_apn", "PARCEL_FIPS_APN"),
    ("apn", "PARCEL_APN"),
    ("apn_d", "PARCEL_APN_D"),
    ("s_city", "SITE_CITY"),
    ("s_addr_d", "SITE_ADDR"),
    ("parcel_id", "PARCEL_ID"),
    ("state_name", "SITE_STATE"),
    ("zip_code", "SITE_ZIP"),
];

/// Width of the derived parcel id field.
const PARCEL_ID_WIDTH: usize = 255;

/// Derives a unique parcel id for every record.
///
/// The id is `{fips_apn}_{oid}`; records with no fips_apn value get
/// `no_fips_apn__{oid}`. The oid comes from the configured object-id
/// field when it exists, otherwise the 1-based row number is used.
/// The fips_apn values alone are not unique even with duplicate
/// geometries removed, hence the oid suffix.
///
/// Any existing id field is dropped and recreated, so reruns never see
/// ids from a previous pass.
pub fn assign_parcel_ids(
    store: &mut dyn RecordStore,
    fips_field: &str,
    oid_field: &str,
    id_field: &str,
) -> Result<usize, StoreError> {
    let fips_values = store.read_column(fips_field)?;
    let oid_values = if store.has_field(oid_field) {
        Some(store.read_column(oid_field)?)
    } else {
        debug!("No {} field; falling back to row numbers", oid_field);
        None
    };

    if store.has_field(id_field) {
        store.drop_field(id_field)?;
    }
    store.add_field(FieldSchema::text(id_field, PARCEL_ID_WIDTH))?;

    let mut assigned = 0;
    for (row, fips) in fips_values.iter().enumerate() {
        let oid = oid_values
            .as_ref()
            .and_then(|values| values[row].clone())
            .unwrap_or_else(|| (row + 1).to_string());

        let id = match fips.as_deref() {
            Some(fips) if !fips.is_empty() => format!("{}_{}", fips, oid),
            _ => format!("no_fips_apn__{}", oid),
        };

        store.write_row(row, id_field, FieldValue::Text(id))?;
        assigned += 1;
    }

    Ok(assigned)
}

/// Sets a constant text value on every record, adding the field if it
/// does not exist.
pub fn set_constant_field(
    store: &mut dyn RecordStore,
    field: &str,
    value: &str,
) -> Result<(), StoreError> {
    if !store.has_field(field) {
        store.add_field(FieldSchema::unbounded_text(field))?;
    }
    for row in 0..store.record_count() {
        store.write_row(row, field, FieldValue::Text(value.to_string()))?;
    }
    Ok(())
}

/// Output dataset name for a county.
///
/// `"Santa Clara County"` becomes `"SANTACLARA_Parcels"`.
pub fn county_dataset_name(county: &str) -> String {
    let stripped = county.replace(" County", "").replace(' ', "");
    format!("{}_Parcels", stripped.to_uppercase())
}

/// Splits a statewide table into one table per county.
///
/// Counties are taken from the distinct values of the county field in
/// first-seen order. Records with no county value cannot be routed to
/// an output; they are counted, logged, and left out.
pub fn split_by_county(
    store: &MemoryStore,
    county_field: &str,
) -> Result<Vec<(String, MemoryStore)>, StoreError> {
    let counties = store.distinct_values(county_field)?;

    let mut outputs = Vec::with_capacity(counties.len());
    for county in &counties {
        let rows = store.select_equal(county_field, county)?;
        let subset = store.select_into(&rows)?;
        debug!("{}: {} records", county, subset.record_count());
        outputs.push((county_dataset_name(county), subset));
    }

    let routed: usize = outputs.iter().map(|(_, s)| s.record_count()).sum();
    let unrouted = store.record_count() - routed;
    if unrouted > 0 {
        warn!("{} record(s) with no {} value were left out of the split", unrouted, county_field);
    }

    Ok(outputs)
}

/// Applies a from/to rename table to the fields that exist.
///
/// Returns the number of fields renamed. Missing source fields are
/// skipped; a rename whose target already exists is an error.
pub fn rename_fields(
    store: &mut dyn RecordStore,
    renames: &[(String, String)],
) -> Result<usize, StoreError> {
    let mut renamed = 0;
    for (from, to) in renames {
        if store.has_field(from) {
            store.rename_field(from, to)?;
            renamed += 1;
        }
    }
    Ok(renamed)
}

/// The default rename table as owned pairs.
pub fn default_renames() -> Vec<(String, String)> {
    DEFAULT_FIELD_RENAMES
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statewide_store() -> MemoryStore {
        let mut store = MemoryStore::with_fields(vec![
            FieldSchema::unbounded_text("objectid"),
            FieldSchema::unbounded_text("fips_apn"),
            FieldSchema::unbounded_text("county_name"),
        ]);
        for (oid, fips, county) in [
            ("1", "06001_123", "Alameda County"),
            ("2", "", "Santa Clara County"),
            ("3", "06085_456", "Santa Clara County"),
        ] {
            let fips_value = if fips.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Text(fips.to_string())
            };
            store
                .push_row(vec![
                    FieldValue::Text(oid.to_string()),
                    fips_value,
                    FieldValue::Text(county.to_string()),
                ])
                .unwrap();
        }
        store
    }

    #[test]
    fn test_assign_parcel_ids() {
        let mut store = statewide_store();
        let assigned =
            assign_parcel_ids(&mut store, "fips_apn", "objectid", "parcel_id").unwrap();

        assert_eq!(assigned, 3);
        assert_eq!(
            store.read_row(0, "parcel_id").unwrap(),
            Some("06001_123_1".to_string())
        );
        // Missing fips_apn gets the fallback prefix (with its doubled
        // underscore, matching the historical datasets).
        assert_eq!(
            store.read_row(1, "parcel_id").unwrap(),
            Some("no_fips_apn__2".to_string())
        );
    }

    #[test]
    fn test_assign_parcel_ids_row_number_fallback() {
        let mut store = MemoryStore::with_fields(vec![FieldSchema::unbounded_text("fips_apn")]);
        store
            .push_row(vec![FieldValue::Text("06001_123".to_string())])
            .unwrap();
        store.push_row(vec![FieldValue::Null]).unwrap();

        assign_parcel_ids(&mut store, "fips_apn", "objectid", "parcel_id").unwrap();
        assert_eq!(
            store.read_row(0, "parcel_id").unwrap(),
            Some("06001_123_1".to_string())
        );
        assert_eq!(
            store.read_row(1, "parcel_id").unwrap(),
            Some("no_fips_apn__2".to_string())
        );
    }

    #[test]
    fn test_assign_parcel_ids_recreates_field() {
        let mut store = statewide_store();
        assign_parcel_ids(&mut store, "fips_apn", "objectid", "parcel_id").unwrap();
        let first = store.read_column("parcel_id").unwrap();

        assign_parcel_ids(&mut store, "fips_apn", "objectid", "parcel_id").unwrap();
        assert_eq!(store.read_column("parcel_id").unwrap(), first);
    }

    #[test]
    fn test_set_constant_field() {
        let mut store = statewide_store();
        set_constant_field(&mut store, "state_name", "California").unwrap();
        assert_eq!(
            store.read_column("state_name").unwrap(),
            vec![Some("California".to_string()); 3]
        );
    }

    #[test]
    fn test_county_dataset_name() {
        assert_eq!(county_dataset_name("Alameda County"), "ALAMEDA_Parcels");
        assert_eq!(county_dataset_name("Santa Clara County"), "SANTACLARA_Parcels");
        assert_eq!(county_dataset_name("San Luis Obispo County"), "SANLUISOBISPO_Parcels");
    }

    #[test]
    fn test_split_by_county() {
        let store = statewide_store();
        let outputs = split_by_county(&store, "county_name").unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, "ALAMEDA_Parcels");
        assert_eq!(outputs[0].1.record_count(), 1);
        assert_eq!(outputs[1].0, "SANTACLARA_Parcels");
        assert_eq!(outputs[1].1.record_count(), 2);
    }

    #[test]
    fn test_split_leaves_out_missing_county() {
        let mut store = statewide_store();
        store
            .push_row(vec![
                FieldValue::Text("4".to_string()),
                FieldValue::Text("06999_1".to_string()),
                FieldValue::Null,
            ])
            .unwrap();

        let outputs = split_by_county(&store, "county_name").unwrap();
        let routed: usize = outputs.iter().map(|(_, s)| s.record_count()).sum();
        assert_eq!(routed, 3);
    }

    #[test]
    fn test_rename_fields_skips_missing() {
        let mut store = statewide_store();
        let renamed = rename_fields(&mut store, &default_renames()).unwrap();

        // Only county_name and fips_apn from the default table exist here.
        assert_eq!(renamed, 2);
        assert!(store.has_field("COUNTYNAME"));
        assert!(store.has_field("PARCEL_FIPS_APN"));
        assert!(store.has_field("objectid"));
    }
}
