//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.parcelprep.toml` files.

use crate::cli::{Args, Command};
use crate::models::OverflowPolicy;
use crate::prepare::default_renames;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Field names on the parcel and intersection tables.
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Overlap aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Preparation stage settings.
    #[serde(default)]
    pub prepare: PrepareConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path for the run report; no report is written when unset.
    #[serde(default)]
    pub report: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            report: None,
            verbose: false,
        }
    }
}

/// Field names the batch stages read and write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    /// Zone-key field on the parcel table (also the id the prepare
    /// stage derives).
    #[serde(default = "default_key_field")]
    pub key_field: String,

    /// Class-value column in the intersection table.
    #[serde(default = "default_class_field")]
    pub class_field: String,

    /// Percent-cover column in the intersection table.
    #[serde(default = "default_percent_field")]
    pub percent_field: String,

    /// Designation field written by the overlap stage.
    #[serde(default = "default_designation_field")]
    pub designation_field: String,

    /// Count field written by the overlap stage.
    #[serde(default = "default_count_field")]
    pub count_field: String,

    /// County field used by the split stage.
    #[serde(default = "default_county_field")]
    pub county_field: String,

    /// Source field for the derived parcel id.
    #[serde(default = "default_fips_field")]
    pub fips_field: String,

    /// Object-id field used as the id suffix when present.
    #[serde(default = "default_oid_field")]
    pub oid_field: String,

    /// Constant state field stamped by the prepare stage.
    #[serde(default = "default_state_field")]
    pub state_field: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            key_field: default_key_field(),
            class_field: default_class_field(),
            percent_field: default_percent_field(),
            designation_field: default_designation_field(),
            count_field: default_count_field(),
            county_field: default_county_field(),
            fips_field: default_fips_field(),
            oid_field: default_oid_field(),
            state_field: default_state_field(),
        }
    }
}

fn default_key_field() -> String {
    "parcel_id".to_string()
}

fn default_class_field() -> String {
    "zoning_code".to_string()
}

fn default_percent_field() -> String {
    "percentage".to_string()
}

fn default_designation_field() -> String {
    "zoning_designations".to_string()
}

fn default_count_field() -> String {
    "zoning_count".to_string()
}

fn default_county_field() -> String {
    "county_name".to_string()
}

fn default_fips_field() -> String {
    "fips_apn".to_string()
}

fn default_oid_field() -> String {
    "objectid".to_string()
}

fn default_state_field() -> String {
    "state_name".to_string()
}

/// Overlap aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Minimum percent cover for a class to be recorded against a zone.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Declared character width of the designation field.
    #[serde(default = "default_designation_width")]
    pub designation_width: usize,

    /// Policy when an encoded designation exceeds the field width.
    #[serde(default)]
    pub on_overflow: OverflowPolicy,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            designation_width: default_designation_width(),
            on_overflow: OverflowPolicy::default(),
        }
    }
}

fn default_threshold() -> f64 {
    10.0
}

fn default_designation_width() -> usize {
    500
}

/// Preparation stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Value stamped into the constant state field.
    #[serde(default = "default_state_value")]
    pub state_value: String,

    /// Delivery rename table as (from, to) pairs.
    #[serde(default = "default_renames")]
    pub renames: Vec<(String, String)>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            state_value: default_state_value(),
            renames: default_renames(),
        }
    }
}

fn default_state_value() -> String {
    "California".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists
    /// but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".parcelprep.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; only
    /// explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &Args) {
        if args.verbose {
            self.general.verbose = true;
        }
        if let Some(ref report) = args.report {
            self.general.report = Some(report.display().to_string());
        }

        match &args.command {
            Some(Command::Overlap(overlap)) => {
                if let Some(threshold) = overlap.threshold {
                    self.aggregation.threshold = threshold;
                }
                if let Some(width) = overlap.designation_width {
                    self.aggregation.designation_width = width;
                }
                if let Some(policy) = overlap.on_overflow {
                    self.aggregation.on_overflow = policy.into();
                }
                if let Some(ref field) = overlap.key_field {
                    self.fields.key_field = field.clone();
                }
                if let Some(ref field) = overlap.class_field {
                    self.fields.class_field = field.clone();
                }
                if let Some(ref field) = overlap.percent_field {
                    self.fields.percent_field = field.clone();
                }
                if let Some(ref field) = overlap.designation_field {
                    self.fields.designation_field = field.clone();
                }
                if let Some(ref field) = overlap.count_field {
                    self.fields.count_field = field.clone();
                }
            }
            Some(Command::Prepare(prepare)) => {
                if let Some(ref field) = prepare.fips_field {
                    self.fields.fips_field = field.clone();
                }
                if let Some(ref field) = prepare.oid_field {
                    self.fields.oid_field = field.clone();
                }
                if let Some(ref field) = prepare.id_field {
                    self.fields.key_field = field.clone();
                }
                if let Some(ref value) = prepare.state_value {
                    self.prepare.state_value = value.clone();
                }
            }
            Some(Command::Split(split)) => {
                if let Some(ref field) = split.county_field {
                    self.fields.county_field = field.clone();
                }
            }
            Some(Command::Rename(_)) | None => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fields.key_field, "parcel_id");
        assert_eq!(config.aggregation.threshold, 10.0);
        assert_eq!(config.aggregation.designation_width, 500);
        assert_eq!(config.aggregation.on_overflow, OverflowPolicy::Fail);
        assert_eq!(config.prepare.state_value, "California");
        assert!(!config.prepare.renames.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
report = "run_report.md"
verbose = true

[fields]
key_field = "cbi_parcel_id_fips_apn_oid"
class_field = "symbology"

[aggregation]
threshold = 25.0
designation_width = 255
on_overflow = "skip"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.report.as_deref(), Some("run_report.md"));
        assert!(config.general.verbose);
        assert_eq!(config.fields.key_field, "cbi_parcel_id_fips_apn_oid");
        assert_eq!(config.fields.class_field, "symbology");
        // Unset fields keep their defaults.
        assert_eq!(config.fields.percent_field, "percentage");
        assert_eq!(config.aggregation.threshold, 25.0);
        assert_eq!(config.aggregation.designation_width, 255);
        assert_eq!(config.aggregation.on_overflow, OverflowPolicy::Skip);
    }

    #[test]
    fn test_parse_renames() {
        let toml_content = r#"
[prepare]
renames = [["fips", "FIPS_CODE"], ["apn", "PARCEL_APN"]]
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.prepare.renames.len(), 2);
        assert_eq!(config.prepare.renames[0].0, "fips");
        assert_eq!(config.prepare.renames[0].1, "FIPS_CODE");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[fields]"));
        assert!(toml_str.contains("[aggregation]"));
        assert!(toml_str.contains("[prepare]"));
    }
}
