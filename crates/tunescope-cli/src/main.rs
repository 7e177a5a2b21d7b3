//! TuneScope command line
//!
//! ```text
//! tunescope analyze  --log drive.json --calibration tune.json [--autotune] [--json]
//! tunescope autotune --log drive.json --calibration tune.json --output corrected.json
//! tunescope demo     --seed 7 [--write-dir out/]
//! ```
//!
//! Logs are read in their normalized JSON form: `{"columns": [...], "rows": [[...], ...]}`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::info;
use tunescope_core::autotune::{AutotuneEngine, AutotuneReport};
use tunescope_core::calibration::CalibrationStore;
use tunescope_core::config::AnalysisConfig;
use tunescope_core::demo::{calibration_document, PullSimulator};
use tunescope_core::detect::DetectionResult;
use tunescope_core::log::{LogDataset, RawLog};
use tunescope_core::session::{AnalysisSession, SessionReport};

#[derive(Parser, Debug)]
#[command(name = "tunescope")]
#[command(about = "ECU datalog event analysis and fuel table autotune")]
#[command(version)]
struct CliArgs {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run every detector over a log
    Analyze {
        /// Normalized log (JSON)
        #[arg(long)]
        log: PathBuf,
        /// Calibration document (JSON)
        #[arg(long)]
        calibration: PathBuf,
        /// Analysis configuration (JSON)
        #[arg(long, env = "TUNESCOPE_CONFIG")]
        config: Option<PathBuf>,
        /// Include autotune in the report
        #[arg(long)]
        autotune: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute fuel table corrections and optionally export them
    Autotune {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        calibration: PathBuf,
        #[arg(long, env = "TUNESCOPE_CONFIG")]
        config: Option<PathBuf>,
        /// Override the minimum rows per cell
        #[arg(long)]
        min_samples: Option<usize>,
        /// Override the per-cell change limit (percent)
        #[arg(long)]
        change_limit: Option<f64>,
        /// Merge into this document instead of the loaded calibration
        #[arg(long)]
        base: Option<PathBuf>,
        /// Write the corrected calibration here
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Analyze a simulated drive against the demo calibration
    Demo {
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Also write the demo log and calibration into this directory
        #[arg(long)]
        write_dir: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        SubCommand::Analyze {
            log,
            calibration,
            config,
            autotune,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let store = load_calibration(&calibration, &config)?;
            let dataset = load_log(&log, &config)?;
            let report = AnalysisSession::new(&store, &dataset, &config).run(autotune);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        SubCommand::Autotune {
            log,
            calibration,
            config,
            min_samples,
            change_limit,
            base,
            output,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(min) = min_samples {
                config.autotune.min_samples = min;
            }
            if let Some(limit) = change_limit {
                if limit <= 0.0 || !limit.is_finite() {
                    bail!("--change-limit must be positive, got {limit}");
                }
                config.autotune.change_limit_percent = limit;
            }

            let store = load_calibration(&calibration, &config)?;
            let dataset = load_log(&log, &config)?;
            let engine = AutotuneEngine::new(&store, &dataset);
            let report = engine
                .analyze(&config.autotune)
                .context("Autotune analysis failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_autotune(&report);
            }

            if let Some(output) = output {
                let base = base.as_deref().map(read_json).transpose()?;
                let corrected = engine
                    .export_corrected_calibration(&report, base.as_ref())
                    .context("Export failed")?;
                fs::write(&output, serde_json::to_string_pretty(&corrected)?)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                info!("Corrected calibration written to {}", output.display());
            } else if base.is_some() {
                bail!("--base needs --output");
            }
        }

        SubCommand::Demo {
            seed,
            write_dir,
            json,
        } => {
            let config = AnalysisConfig::default();
            let mut simulator = PullSimulator::new(seed);
            let raw = simulator.raw_log();
            let document = calibration_document();

            if let Some(dir) = write_dir {
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                fs::write(dir.join("demo_log.json"), serde_json::to_string_pretty(&raw)?)?;
                fs::write(
                    dir.join("demo_calibration.json"),
                    serde_json::to_string_pretty(&document)?,
                )?;
                info!("Demo files written to {}", dir.display());
            }

            let mut store = CalibrationStore::with_map_ids(config.maps.clone());
            store
                .try_parse_value(document)
                .context("Demo calibration did not load")?;
            let dataset = LogDataset::from_raw(raw, &config.ingest);
            let report = AnalysisSession::new(&store, &dataset, &config).run(true);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn load_calibration(path: &Path, config: &AnalysisConfig) -> Result<CalibrationStore> {
    let mut store = CalibrationStore::with_map_ids(config.maps.clone());
    store
        .load(path)
        .with_context(|| format!("Failed to load calibration {}", path.display()))?;
    info!(
        "Loaded calibration {} ({} maps)",
        path.display(),
        store.maps().len()
    );
    Ok(store)
}

fn load_log(path: &Path, config: &AnalysisConfig) -> Result<LogDataset> {
    let raw: RawLog = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} is not a normalized log", path.display()))?;
    let dataset = LogDataset::from_raw(raw, &config.ingest);
    if dataset.is_empty() {
        bail!("{} contains no usable rows", path.display());
    }
    info!(
        "Loaded {} rows from {} ({} dropped, {:.3}s interval)",
        dataset.len(),
        path.display(),
        dataset.dropped_rows(),
        dataset.sampling_interval()
    );
    Ok(dataset)
}

fn print_report(report: &SessionReport) {
    println!(
        "Log: {} rows, {} channels bound",
        report.log.rows,
        report.log.bindings.len()
    );
    if let Some((start, end)) = report.log.time_range {
        println!("     {start:.2}s .. {end:.2}s");
    }
    if let Some(cal) = &report.calibration {
        println!(
            "Calibration: {}",
            cal.cal_id.as_deref().unwrap_or("(no id)")
        );
    }
    println!();

    for detection in &report.detections {
        print_detection(detection);
    }

    match (&report.autotune, &report.autotune_error) {
        (Some(autotune), _) => print_autotune(autotune),
        (None, Some(error)) => println!("Autotune: {error}"),
        (None, None) => {}
    }
}

fn print_detection(result: &DetectionResult) {
    let stats = &result.statistics;
    print!("{:<24}", result.domain.name());
    if let Some(error) = &result.error {
        println!("skipped: {error}");
        return;
    }
    println!(
        "{} {} / {} {} groups, {:.1}% out of target",
        stats.type_a_groups,
        result.type_a_label,
        stats.type_b_groups,
        result.type_b_label,
        stats.out_of_target_pct
    );
    for group in &result.event_groups {
        println!(
            "    {:>8.2}s  {:<12} {:>6.2}s  {:?}  peak {:.3} (dev {:+.3})",
            group.start,
            group.event_type,
            group.duration,
            group.severity,
            group.peak_value,
            group.peak_deviation
        );
    }
}

fn print_autotune(report: &AutotuneReport) {
    println!();
    println!(
        "Autotune '{}' ({}x{}): {} cells modified, {} clamped at {}%",
        report.table_id,
        report.rpm_axis.len(),
        report.load_axis.len(),
        report.modified_cell_count,
        report.clamped_cells.len(),
        report.change_limit_percent
    );
    println!(
        "    rows: {} total, {} open loop, {} closed loop, {} filtered",
        report.rows.total, report.rows.open_loop, report.rows.closed_loop, report.rows.filtered
    );
    for cell in report.cells() {
        println!(
            "    {:?} rpm {:>6.0} load {:>5.2}: {:>7.2} -> {:>7.2} ({:+.1}%{})",
            cell.mode,
            cell.rpm,
            cell.load,
            cell.current,
            cell.applied,
            cell.applied_change_pct,
            if cell.clamped { ", clamped" } else { "" }
        );
    }
}
