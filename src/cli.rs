//! Command-line interface definitions.
//!
//! This module defines the CLI structure using clap's derive macros.

use crate::models::OverflowPolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Batch toolchain for parcel delivery preparation and zoning overlap
/// aggregation.
#[derive(Parser, Debug)]
#[command(
    name = "parcelprep",
    version,
    about = "Prepare parcel tables and aggregate zoning overlaps",
    long_about = "ParcelPrep runs the parcel delivery pipeline: derive stable \
                  parcel ids, stamp delivery constants, split statewide tables \
                  by county, apply delivery field names, and write aggregated \
                  zoning designations from an intersection table."
)]
pub struct Args {
    /// Pipeline stage to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "PARCELPREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write a run report to this path
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "markdown")]
    pub format: ReportFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .parcelprep.toml in the current directory
    #[arg(long)]
    pub init_config: bool,
}

/// Pipeline stages.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate zoning overlaps onto the parcel table
    Overlap(OverlapArgs),
    /// Derive parcel ids and stamp delivery constants
    Prepare(PrepareArgs),
    /// Split a statewide parcel table into per-county tables
    Split(SplitArgs),
    /// Apply the delivery field-name table
    Rename(RenameArgs),
}

/// Arguments for the overlap stage.
#[derive(clap::Args, Debug)]
pub struct OverlapArgs {
    /// Intersection table (zone key, class value, percent cover)
    #[arg(short, long, value_name = "FILE")]
    pub intersections: PathBuf,

    /// Parcel table to annotate
    #[arg(short, long, value_name = "FILE")]
    pub parcels: PathBuf,

    /// Output path for the annotated parcel table
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Minimum percent cover to record a class (0-100)
    #[arg(short, long, value_name = "PERCENT")]
    pub threshold: Option<f64>,

    /// Designation field character width
    #[arg(long, value_name = "CHARS")]
    pub designation_width: Option<usize>,

    /// Policy when a designation exceeds the field width
    #[arg(long, value_enum)]
    pub on_overflow: Option<OverflowArg>,

    /// Build the index and report without writing the output table
    #[arg(long)]
    pub dry_run: bool,

    /// Zone-key field on the parcel table
    #[arg(long, value_name = "FIELD")]
    pub key_field: Option<String>,

    /// Class-value column in the intersection table
    #[arg(long, value_name = "FIELD")]
    pub class_field: Option<String>,

    /// Percent-cover column in the intersection table
    #[arg(long, value_name = "FIELD")]
    pub percent_field: Option<String>,

    /// Designation field to write
    #[arg(long, value_name = "FIELD")]
    pub designation_field: Option<String>,

    /// Count field to write
    #[arg(long, value_name = "FIELD")]
    pub count_field: Option<String>,
}

/// Arguments for the prepare stage.
#[derive(clap::Args, Debug)]
pub struct PrepareArgs {
    /// Parcel table to prepare
    #[arg(short, long, value_name = "FILE")]
    pub parcels: PathBuf,

    /// Output path for the prepared table
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Source field for the derived parcel id
    #[arg(long, value_name = "FIELD")]
    pub fips_field: Option<String>,

    /// Object-id field used as the id suffix
    #[arg(long, value_name = "FIELD")]
    pub oid_field: Option<String>,

    /// Derived id field to write
    #[arg(long, value_name = "FIELD")]
    pub id_field: Option<String>,

    /// Value stamped into the constant state field
    #[arg(long, value_name = "VALUE")]
    pub state_value: Option<String>,
}

/// Arguments for the split stage.
#[derive(clap::Args, Debug)]
pub struct SplitArgs {
    /// Statewide parcel table to split
    #[arg(short, long, value_name = "FILE")]
    pub parcels: PathBuf,

    /// Directory for the per-county output tables
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// County field to split on
    #[arg(long, value_name = "FIELD")]
    pub county_field: Option<String>,
}

/// Arguments for the rename stage.
#[derive(clap::Args, Debug)]
pub struct RenameArgs {
    /// Parcel table to rename
    #[arg(short, long, value_name = "FILE")]
    pub parcels: PathBuf,

    /// Output path for the renamed table
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

/// Report output format.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    /// Markdown format
    Markdown,
    /// JSON format
    Json,
}

/// Overflow policy as a CLI value.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowArg {
    /// Abort without writing, reporting every offender
    Fail,
    /// Write the rest and report the offenders
    Skip,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Fail => OverflowPolicy::Fail,
            OverflowArg::Skip => OverflowPolicy::Skip,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the arguments after parsing.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        if self.command.is_none() && !self.init_config {
            return Err("No stage specified. Use --help to see available commands".to_string());
        }

        if let Some(Command::Overlap(ref overlap)) = self.command {
            if let Some(threshold) = overlap.threshold {
                if !(0.0..=100.0).contains(&threshold) {
                    return Err(format!(
                        "Threshold must be between 0 and 100, got {}",
                        threshold
                    ));
                }
            }
            if let Some(width) = overlap.designation_width {
                if width < 2 {
                    return Err(format!(
                        "Designation width must be at least 2 characters, got {}",
                        width
                    ));
                }
            }
        }

        Ok(())
    }

    /// Get the effective log level based on flags.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overlap() {
        let args = Args::parse_from([
            "parcelprep",
            "overlap",
            "--intersections",
            "tabulated.csv",
            "--parcels",
            "parcels.csv",
            "--output",
            "out.csv",
            "--threshold",
            "25",
        ]);

        match args.command {
            Some(Command::Overlap(ref overlap)) => {
                assert_eq!(overlap.intersections, PathBuf::from("tabulated.csv"));
                assert_eq!(overlap.threshold, Some(25.0));
                assert!(!overlap.dry_run);
            }
            _ => panic!("expected overlap command"),
        }
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let args = Args::parse_from([
            "parcelprep",
            "overlap",
            "-i",
            "a.csv",
            "-p",
            "b.csv",
            "-o",
            "c.csv",
            "--threshold",
            "101",
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_width_too_small() {
        let args = Args::parse_from([
            "parcelprep",
            "overlap",
            "-i",
            "a.csv",
            "-p",
            "b.csv",
            "-o",
            "c.csv",
            "--designation-width",
            "1",
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_verbose_quiet_conflict() {
        let args = Args::parse_from([
            "parcelprep",
            "--verbose",
            "--quiet",
            "rename",
            "-p",
            "a.csv",
            "-o",
            "b.csv",
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_no_command_requires_init_config() {
        let args = Args::parse_from(["parcelprep"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["parcelprep", "--init-config"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_overflow_policy_value() {
        let args = Args::parse_from([
            "parcelprep",
            "overlap",
            "-i",
            "a.csv",
            "-p",
            "b.csv",
            "-o",
            "c.csv",
            "--on-overflow",
            "skip",
        ]);
        match args.command {
            Some(Command::Overlap(ref overlap)) => {
                assert_eq!(overlap.on_overflow, Some(OverflowArg::Skip));
                assert_eq!(
                    OverflowPolicy::from(OverflowArg::Skip),
                    OverflowPolicy::Skip
                );
            }
            _ => panic!("expected overlap command"),
        }
    }

    #[test]
    fn test_log_level() {
        let args = Args::parse_from(["parcelprep", "--init-config"]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        let args = Args::parse_from(["parcelprep", "--verbose", "--init-config"]);
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        let args = Args::parse_from(["parcelprep", "--quiet", "--init-config"]);
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
