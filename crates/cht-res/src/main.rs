/// Hilltop curvature resolution sweep.
///
/// Reads `<prefix>_<res>_DEM.<format>` for every configured resolution plus
/// the `<prefix>_CH` channel head file from `<path>`, and writes
/// `<prefix>_ChtResData.txt` and one `<prefix>_<res>_Hist_CHT.txt` per
/// resolution back into `<path>`.
///
/// Usage: cht-res <path> <prefix> <dem-format> <window-size> [--settings FILE]
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use cht_core::io::RasterFormat;
use cht_core::{run_sweep, NativePipeline, SweepConfig, SweepSettings};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cht-res",
    about = "Hilltop curvature statistics across a multi-resolution DEM set"
)]
struct Args {
    /// Directory holding the DEMs and channel heads; outputs are written here
    path: PathBuf,

    /// File name prefix shared by every input and output
    prefix: String,

    /// DEM format and file extension: bil, flt, asc or tif (case kept)
    #[arg(value_parser = parse_format)]
    dem_format: String,

    /// Surface-fitting window radius in map units
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    window_size: u32,

    /// JSON file overriding the sweep settings (resolutions, bin width, ...)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Process resolutions concurrently (needs the `threading` feature)
    #[arg(long)]
    parallel: bool,
}

/// Accepts known formats only, but keeps the string as typed: it is the
/// extension of every DEM file name.
fn parse_format(s: &str) -> Result<String, String> {
    s.parse::<RasterFormat>().map(|_| s.to_string()).map_err(|e| e.to_string())
}

fn load_settings(path: Option<&PathBuf>) -> Result<SweepSettings> {
    let Some(path) = path else {
        return Ok(SweepSettings::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read settings file {}", path.display()))?;
    SweepSettings::from_json(&text)
        .with_context(|| format!("Invalid settings file {}", path.display()))
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if !args.path.is_dir() {
        bail!("Data directory {} does not exist", args.path.display());
    }

    let mut settings = load_settings(args.settings.as_ref())?;
    settings.parallel |= args.parallel;

    let config =
        SweepConfig::new(&args.path, &args.prefix, &args.dem_format, args.window_size).with_settings(settings);
    info!(
        "sweeping {} resolutions of {} ({}), window {}",
        config.resolutions().len(),
        config.prefix,
        config.dem_format,
        config.window_size
    );

    let pipeline = NativePipeline::from_config(&config);
    let report = run_sweep(&config, pipeline)
        .with_context(|| format!("Sweep of {} in {} failed", args.prefix, args.path.display()))?;

    info!(
        "done: {} rows in {}, {} histograms",
        report.rows.len(),
        report.table.display(),
        report.histograms.len()
    );
    Ok(())
}
