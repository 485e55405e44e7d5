use std::fs;

use polars::prelude::DataFrame;
use tracing::{info, warn};
use trailmetrics_gpx::parse_track_log;

use crate::config::Config;
use crate::error::Result;
use crate::outputs;

#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub points: usize,
    pub segments: usize,
    pub extension_columns: Vec<String>,
}

/// Reads and parses the configured GPX recording into the flat per-point
/// table, without writing anything.
pub fn extract_dataframe(config: &Config) -> Result<(DataFrame, ExtractReport)> {
    let content = fs::read_to_string(&config.gpx_path)?;
    let log = parse_track_log(&content)?;

    let report = ExtractReport {
        points: log.points.len(),
        segments: log.metadata.segment_count,
        extension_columns: log
            .extension_names()
            .iter()
            .map(|name| name.to_string())
            .collect(),
    };
    let df = log.to_dataframe()?;
    Ok((df, report))
}

/// Extractor stage: GPX recording in, raw per-point CSV atomically out.
/// Values are carried over exactly as recorded; derivations happen later.
pub fn run(config: &Config) -> Result<ExtractReport> {
    let (mut df, report) = extract_dataframe(config)?;
    if report.points == 0 {
        warn!(input = %config.gpx_path.display(), "track contains no points");
    }

    outputs::write_csv_atomic(&mut df, &config.raw_csv_path)?;
    info!(
        points = report.points,
        segments = report.segments,
        extensions = report.extension_columns.len(),
        output = %config.raw_csv_path.display(),
        "extracted track points"
    );
    Ok(report)
}
