use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::{enrich, extract, geometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Regenerated,
    UpToDate,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineReport {
    pub extract: StageOutcome,
    pub enrich: StageOutcome,
    pub route: StageOutcome,
}

/// Runs the linear extract -> enrich -> route graph, regenerating each
/// artifact only when one of its inputs is newer (make semantics). A stage
/// that ran forces every downstream stage to run, so equal-mtime
/// granularity cannot leave the chain half-fresh. The first failing stage
/// aborts the remainder.
pub fn run(config: &Config, force: bool) -> Result<PipelineReport> {
    let extract_outcome = if force || is_stale(&config.raw_csv_path, &[&config.gpx_path])? {
        extract::run(config)?;
        StageOutcome::Regenerated
    } else {
        info!(output = %config.raw_csv_path.display(), "raw table up to date");
        StageOutcome::UpToDate
    };

    let enrich_outcome = if extract_outcome == StageOutcome::Regenerated
        || is_stale(&config.enriched_csv_path, &[&config.raw_csv_path])?
    {
        enrich::run(config)?;
        StageOutcome::Regenerated
    } else {
        info!(output = %config.enriched_csv_path.display(), "enriched table up to date");
        StageOutcome::UpToDate
    };

    let route_outcome = if enrich_outcome == StageOutcome::Regenerated
        || is_stale(&config.route_geojson_path, &[&config.enriched_csv_path])?
    {
        geometry::run(config)?;
        StageOutcome::Regenerated
    } else {
        info!(output = %config.route_geojson_path.display(), "route geometry up to date");
        StageOutcome::UpToDate
    };

    Ok(PipelineReport {
        extract: extract_outcome,
        enrich: enrich_outcome,
        route: route_outcome,
    })
}

/// True when the output is missing or any input is strictly newer.
/// A missing input is an error: the upstream stage has nothing to read.
pub fn is_stale(output: &Path, inputs: &[&Path]) -> Result<bool> {
    let Ok(metadata) = fs::metadata(output) else {
        return Ok(true);
    };
    let target = metadata.modified()?;

    for input in inputs {
        let modified = fs::metadata(input)?.modified()?;
        if modified > target {
            return Ok(true);
        }
    }
    Ok(false)
}
