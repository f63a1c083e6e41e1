//! ParcelPrep - Parcel delivery preparation and zoning overlap toolchain
//!
//! A CLI tool that runs the batch stages of the parcel delivery
//! pipeline: derive stable parcel ids, stamp delivery constants, split
//! statewide tables by county, apply delivery field names, and write
//! aggregated zoning designations from a tabulated intersection table.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, overflow under the fail policy, etc.)
//!   2 - Completed with skipped records (overflow under the skip policy)

mod aggregate;
mod cli;
mod config;
mod models;
mod overlay;
mod prepare;
mod report;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, OverlapArgs, PrepareArgs, RenameArgs, ReportFormat, SplitArgs};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::OverlapFields;
use overlay::{ColumnMap, CsvIntersectionTable, OverlapProvider};
use report::{RunMetadata, RunReport, RunSummary};
use store::RecordStore;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize logging
    init_logging(&args);

    info!("ParcelPrep v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the requested stage
    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Stage failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .parcelprep.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".parcelprep.toml");

    if path.exists() {
        eprintln!("⚠️  .parcelprep.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .parcelprep.toml")?;

    println!("✅ Created .parcelprep.toml with default settings.");
    println!("   Edit it to customize field names, threshold, and the rename table.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the selected stage. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command {
        Some(Command::Overlap(ref overlap)) => run_overlap(overlap, &config, args.format),
        Some(Command::Prepare(ref prepare)) => run_prepare(prepare, &config),
        Some(Command::Split(ref split)) => run_split(split, &config),
        Some(Command::Rename(ref rename)) => run_rename(rename, &config),
        None => unreachable!("validated before dispatch"),
    }
}

/// Run the overlap stage: index the intersection table, write encoded
/// designations onto the parcel table.
fn run_overlap(args: &OverlapArgs, config: &Config, format: ReportFormat) -> Result<i32> {
    let start_time = Instant::now();

    let threshold = config.aggregation.threshold;
    let width = config.aggregation.designation_width;

    // Step 1: Read the tabulated intersection rows
    println!("📥 Reading intersections: {}", args.intersections.display());
    let columns = ColumnMap {
        zone_key: config.fields.key_field.clone(),
        class_value: config.fields.class_field.clone(),
        percent_cover: config.fields.percent_field.clone(),
    };
    let provider = CsvIntersectionTable::new(args.intersections.clone(), columns);
    let rows = provider.intersection_rows()?;

    // Step 2: Build the overlap index
    println!("🗂️  Indexing overlaps (threshold: {}%)...", threshold);
    let index = aggregate::build_overlap_index(&rows, threshold)?;
    println!(
        "   {} zones with qualifying overlaps ({} class entries)",
        index.zone_count(),
        index.entry_count()
    );

    // Handle --dry-run: report the index and exit without writing
    if args.dry_run {
        return handle_dry_run(&rows, &index);
    }

    // Step 3: Annotate the parcel table
    println!("📝 Annotating parcels: {}", args.parcels.display());
    let mut parcels = store::csvio::load_csv(&args.parcels)?;

    let fields = OverlapFields {
        key_field: config.fields.key_field.clone(),
        designation_field: config.fields.designation_field.clone(),
        count_field: config.fields.count_field.clone(),
        designation_width: width,
    };

    let spinner = progress_spinner("Writing designations...");
    let outcome =
        aggregate::apply_overlap_index(&mut parcels, &index, &fields, config.aggregation.on_overflow)?;
    spinner.finish_and_clear();

    store::csvio::save_csv(&parcels, &args.output)?;

    let duration = start_time.elapsed().as_secs_f64();

    // Step 4: Write the run report if requested
    let mut summary = RunSummary {
        rows_read: rows.len(),
        zones_indexed: index.zone_count(),
        classes_kept: index.entry_count(),
        threshold,
        ..RunSummary::default()
    };
    summary.absorb(&outcome);

    if let Some(ref report_path) = config.general.report {
        let run_report = RunReport {
            metadata: RunMetadata {
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                stage: "overlap".to_string(),
                run_date: Utc::now(),
                duration_seconds: duration,
                intersections: Some(args.intersections.display().to_string()),
                parcels: args.parcels.display().to_string(),
                output: args.output.display().to_string(),
            },
            summary: summary.clone(),
        };

        let content = match format {
            ReportFormat::Json => report::generate_json_report(&run_report)?,
            ReportFormat::Markdown => report::generate_markdown_report(&run_report),
        };
        std::fs::write(report_path, &content)
            .with_context(|| format!("Failed to write report to {}", report_path))?;
        println!("📄 Report saved to: {}", report_path);
    }

    // Print summary
    println!("\n📊 Overlap Summary:");
    println!("   Records updated: {}", outcome.records_updated);
    println!("   Records with no overlap: {}", outcome.records_empty);
    if outcome.records_missing_key > 0 {
        println!("   Records with no zone key: {}", outcome.records_missing_key);
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Overlap complete! Output saved to: {}", args.output.display());

    if !outcome.skipped.is_empty() {
        eprintln!(
            "\n⛔ {} record(s) skipped: designation exceeds {} characters (exit code 2).",
            outcome.skipped.len(),
            width
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print the index that would be written, exit.
fn handle_dry_run(rows: &[models::IntersectionRow], index: &models::OverlapIndex) -> Result<i32> {
    println!("\n🔍 Dry run: no output table will be written.\n");
    println!("   Intersection rows read: {}", rows.len());
    println!("   Zones indexed: {}", index.zone_count());
    println!("   Class entries kept: {}", index.entry_count());

    let mut zones: Vec<_> = index.iter().collect();
    zones.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
    for (zone, overlaps) in zones.iter().take(10) {
        println!("     {} -> {}", zone, overlaps.encode());
    }
    if zones.len() > 10 {
        println!("     ... and {} more", zones.len() - 10);
    }

    println!("\n✅ Dry run complete. No records were written.");
    Ok(0)
}

/// Run the prepare stage: derive parcel ids and stamp the state
/// constant.
fn run_prepare(args: &PrepareArgs, config: &Config) -> Result<i32> {
    let start_time = Instant::now();

    println!("📥 Reading parcels: {}", args.parcels.display());
    let mut parcels = store::csvio::load_csv(&args.parcels)?;

    println!("🔑 Deriving parcel ids...");
    let assigned = prepare::assign_parcel_ids(
        &mut parcels,
        &config.fields.fips_field,
        &config.fields.oid_field,
        &config.fields.key_field,
    )?;

    println!(
        "🏷️  Stamping {} = {:?}...",
        config.fields.state_field, config.prepare.state_value
    );
    prepare::set_constant_field(
        &mut parcels,
        &config.fields.state_field,
        &config.prepare.state_value,
    )?;

    store::csvio::save_csv(&parcels, &args.output)?;

    println!("\n📊 Prepare Summary:");
    println!("   Ids assigned: {}", assigned);
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Prepare complete! Output saved to: {}", args.output.display());
    Ok(0)
}

/// Run the split stage: one output table per county.
fn run_split(args: &SplitArgs, config: &Config) -> Result<i32> {
    let start_time = Instant::now();

    println!("📥 Reading parcels: {}", args.parcels.display());
    let parcels = store::csvio::load_csv(&args.parcels)?;

    println!("✂️  Splitting on {}...", config.fields.county_field);
    let outputs = prepare::split_by_county(&parcels, &config.fields.county_field)?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    for (name, subset) in &outputs {
        let path = args.output_dir.join(format!("{}.csv", name));
        store::csvio::save_csv(subset, &path)?;
        println!("   📄 {} ({} records)", path.display(), subset.record_count());
    }

    println!("\n📊 Split Summary:");
    println!("   Counties: {}", outputs.len());
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!(
        "\n✅ Split complete! Tables saved to: {}",
        args.output_dir.display()
    );
    Ok(0)
}

/// Run the rename stage: apply the delivery field-name table.
fn run_rename(args: &RenameArgs, config: &Config) -> Result<i32> {
    let start_time = Instant::now();

    println!("📥 Reading parcels: {}", args.parcels.display());
    let mut parcels = store::csvio::load_csv(&args.parcels)?;

    println!("🏷️  Applying delivery field names...");
    let renamed = prepare::rename_fields(&mut parcels, &config.prepare.renames)?;
    let skipped = config.prepare.renames.len() - renamed;
    if skipped > 0 {
        warn!("{} rename(s) skipped: source field not present", skipped);
    }

    store::csvio::save_csv(&parcels, &args.output)?;

    println!("\n📊 Rename Summary:");
    println!("   Fields renamed: {}", renamed);
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Rename complete! Output saved to: {}", args.output.display());
    Ok(0)
}

/// A steady-tick spinner for the write-back pass.
fn progress_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .parcelprep.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
