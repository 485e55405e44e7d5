use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trailmetrics_core::pipeline::StageOutcome;
use trailmetrics_core::summary::TrackSummary;
use trailmetrics_core::{enrich, extract, geometry, outputs, pipeline, summary, Config};

#[derive(Parser, Debug)]
#[command(author, version, about = "Trail race GPX analysis pipeline", long_about = None)]
struct Cli {
    /// Path to a pipeline configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the per-point table from the GPX recording
    Extract,
    /// Derive metric columns from the extracted table
    Enrich,
    /// Export the course route as GeoJSON
    Route,
    /// Print whole-track statistics from the enriched table
    Summary,
    /// Run every stage, skipping artifacts that are already fresh
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Regenerate all artifacts even when they look fresh
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Extract => handle_extract(&config),
        Command::Enrich => handle_enrich(&config),
        Command::Route => handle_route(&config),
        Command::Summary => handle_summary(&config),
        Command::Run(args) => handle_run(&config, args),
    }
}

fn handle_extract(config: &Config) -> Result<()> {
    let report = extract::run(config).context("extraction failed")?;
    println!(
        "Extracted {} points across {} segments ({} extension metrics) to {}",
        report.points,
        report.segments,
        report.extension_columns.len(),
        config.raw_csv_path.display()
    );
    Ok(())
}

fn handle_enrich(config: &Config) -> Result<()> {
    let rows = enrich::run(config).context("enrichment failed")?;
    println!(
        "Enriched {} rows to {}",
        rows,
        config.enriched_csv_path.display()
    );
    Ok(())
}

fn handle_route(config: &Config) -> Result<()> {
    let points = geometry::run(config).context("route export failed")?;
    println!(
        "Exported route with {} points to {}",
        points,
        config.route_geojson_path.display()
    );
    Ok(())
}

fn handle_summary(config: &Config) -> Result<()> {
    let df = outputs::read_csv(&config.enriched_csv_path)
        .context("failed to load enriched table (run `trailmetrics run` first)")?;
    let summary = summary::summarize(&df).context("summary failed")?;
    println!("{}", render_summary(&summary));
    Ok(())
}

fn handle_run(config: &Config, args: RunArgs) -> Result<()> {
    let report = pipeline::run(config, args.force).context("pipeline run failed")?;
    info!(
        extract = ?report.extract,
        enrich = ?report.enrich,
        route = ?report.route,
        "pipeline finished"
    );
    for (stage, outcome) in [
        ("extract", report.extract),
        ("enrich", report.enrich),
        ("route", report.route),
    ] {
        let status = match outcome {
            StageOutcome::Regenerated => "regenerated",
            StageOutcome::UpToDate => "up to date",
        };
        println!("{stage}: {status}");
    }
    Ok(())
}

fn render_summary(summary: &TrackSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Metric", "Value"]);

    table.add_row(vec!["Points".to_string(), summary.points.to_string()]);
    table.add_row(vec![
        "Start (local)".to_string(),
        text(summary.start_time_local.clone()),
    ]);
    table.add_row(vec![
        "End (local)".to_string(),
        text(summary.end_time_local.clone()),
    ]);
    table.add_row(vec![
        "Duration".to_string(),
        text(summary.duration_seconds.map(format_duration)),
    ]);
    table.add_row(vec![
        "Total distance".to_string(),
        quantity(summary.total_distance_mile, "mi", 2),
    ]);
    table.add_row(vec![
        "Elevation gain".to_string(),
        quantity(summary.elevation_gain_ft, "ft", 0),
    ]);
    table.add_row(vec![
        "Elevation loss".to_string(),
        quantity(summary.elevation_loss_ft, "ft", 0),
    ]);
    table.add_row(vec![
        "Min elevation".to_string(),
        quantity(summary.min_elevation_ft, "ft", 0),
    ]);
    table.add_row(vec![
        "Max elevation".to_string(),
        quantity(summary.max_elevation_ft, "ft", 0),
    ]);
    table.add_row(vec![
        "Mean speed".to_string(),
        quantity(summary.mean_speed_mph, "mph", 2),
    ]);
    table.add_row(vec![
        "Max speed".to_string(),
        quantity(summary.max_speed_mph, "mph", 2),
    ]);
    table.add_row(vec![
        "Mean cadence".to_string(),
        quantity(summary.mean_cadence, "spm", 0),
    ]);
    table
}

fn text(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

fn quantity(value: Option<f64>, unit: &str, precision: usize) -> String {
    match value {
        Some(value) => format!("{value:.precision$} {unit}"),
        None => "-".to_string(),
    }
}

fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
