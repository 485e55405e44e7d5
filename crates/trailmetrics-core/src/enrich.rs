use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use polars::prelude::*;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::outputs;
use crate::table::float_column;

const METERS_TO_FEET: f64 = 3.28084;
const METERS_TO_MILES: f64 = 0.000621371;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Source columns the enricher cannot work without. Extension metrics such
/// as energy or cadence stay optional; missing values propagate as nulls.
pub const REQUIRED_COLUMNS: [&str; 5] = ["latitude", "longitude", "elevation", "time", "distance"];

pub const VERTICAL_SPEED_COLUMN: &str = "vertical_speed_ft_per_sec";

/// Loads the extracted table, derives the metric columns, and atomically
/// publishes the enriched table. Returns the row count.
pub fn run(config: &Config) -> Result<usize> {
    let df = outputs::read_csv(&config.raw_csv_path)?;
    let mut enriched = enrich_dataframe(&df, config.tz()?)?;
    let rows = enriched.height();
    outputs::write_csv_atomic(&mut enriched, &config.enriched_csv_path)?;
    info!(
        rows,
        output = %config.enriched_csv_path.display(),
        "enriched track table published"
    );
    Ok(rows)
}

/// Adds the derived columns to an extracted per-point table. Original
/// columns are carried through untouched, in the same row order; the only
/// removal is the `altitude` duplicate of `elevation`.
pub fn enrich_dataframe(df: &DataFrame, timezone: Tz) -> Result<DataFrame> {
    for column in REQUIRED_COLUMNS {
        if df.column(column).is_err() {
            return Err(PipelineError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let len = df.height();
    let elevation = float_column(df, "elevation")?;
    let distance = float_column(df, "distance")?;
    let time_utc = parse_time_column(df)?;

    let elevation_ft: Vec<Option<f64>> = elevation
        .into_iter()
        .map(|value| value.map(|meters| meters * METERS_TO_FEET))
        .collect();
    let distance_mile: Vec<Option<f64>> = distance
        .into_iter()
        .map(|value| value.map(|meters| meters * METERS_TO_MILES))
        .collect();

    let time_plot: Vec<Option<String>> = time_utc
        .iter()
        .map(|time| {
            time.map(|t| t.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
        })
        .collect();
    let time_local: Vec<Option<String>> = time_utc
        .iter()
        .map(|time| {
            time.map(|t| {
                t.with_timezone(&timezone)
                    .naive_local()
                    .format("%Y-%m-%d %H:%M:%S%.f")
                    .to_string()
            })
        })
        .collect();

    let energy_norm = normalized_energy(df, len)?;

    // Consecutive-row deltas. The first row anchors nothing and both speeds
    // stay undefined there; a non-positive elapsed time leaves them
    // undefined as well, never infinite.
    let mut speed_mph: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut vertical_speed: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut prev: Option<(DateTime<Utc>, Option<f64>, Option<f64>)> = None;

    for idx in 0..len {
        let time = time_utc[idx];
        let dist = distance_mile[idx];
        let elev = elevation_ft[idx];

        let (speed, vertical) = match (prev, time) {
            (Some((prev_time, prev_dist, prev_elev)), Some(now)) => {
                let dt_seconds = (now - prev_time).num_milliseconds() as f64 / 1000.0;
                if dt_seconds <= 0.0 {
                    warn!(
                        row = idx,
                        "non-positive elapsed time between consecutive points; speeds undefined"
                    );
                    (None, None)
                } else {
                    let speed = match (prev_dist, dist) {
                        (Some(a), Some(b)) => Some((b - a) / (dt_seconds / SECONDS_PER_HOUR)),
                        _ => None,
                    };
                    let vertical = match (prev_elev, elev) {
                        (Some(a), Some(b)) => Some((b - a) / dt_seconds),
                        _ => None,
                    };
                    (speed, vertical)
                }
            }
            _ => (None, None),
        };

        speed_mph.push(speed);
        vertical_speed.push(vertical);
        prev = time.map(|now| (now, dist, elev));
    }

    let mut output = df.clone();
    if output.column("altitude").is_ok() {
        output = output.drop("altitude")?;
    }

    output.hstack_mut(&[
        Series::new("elevation_ft".into(), elevation_ft).into(),
        Series::new("time_plot".into(), time_plot).into(),
        Series::new("time_local".into(), time_local).into(),
        Series::new("distance_mile".into(), distance_mile).into(),
        Series::new("energy_norm".into(), energy_norm).into(),
        Series::new("speed_mph".into(), speed_mph).into(),
        Series::new(VERTICAL_SPEED_COLUMN.into(), vertical_speed).into(),
    ])?;

    Ok(output)
}

/// Rows where the runner is ascending (vertical speed > 0). Rows with zero
/// or undefined vertical speed belong to neither view.
pub fn ascending_rows(df: &DataFrame) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .filter(col(VERTICAL_SPEED_COLUMN).gt(lit(0.0)))
        .collect()?)
}

/// Rows where the runner is descending (vertical speed < 0).
pub fn descending_rows(df: &DataFrame) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .filter(col(VERTICAL_SPEED_COLUMN).lt(lit(0.0)))
        .collect()?)
}

fn parse_time_column(df: &DataFrame) -> Result<Vec<Option<DateTime<Utc>>>> {
    let column = df.column("time").map_err(|_| PipelineError::MissingColumn {
        column: "time".to_string(),
    })?;
    let series = column.as_materialized_series();
    if series.dtype() == &DataType::Null {
        return Ok(vec![None; series.len()]);
    }
    let strings = series
        .str()
        .map_err(|_| PipelineError::Validation("column 'time' is not a string column".into()))?;

    strings
        .into_iter()
        .map(|value| match value {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| {
                    PipelineError::Validation(format!("invalid timestamp '{raw}' in time column"))
                }),
        })
        .collect()
}

/// Energy rescaled so the maximum observed value is 1. An absent or
/// degenerate metric leaves the whole column undefined, with a warning,
/// rather than silently zeroing it.
fn normalized_energy(df: &DataFrame, len: usize) -> Result<Vec<Option<f64>>> {
    let Ok(column) = df.column("energy") else {
        warn!("energy metric absent from track; energy_norm left undefined");
        return Ok(vec![None; len]);
    };
    let Ok(series) = column.as_materialized_series().cast(&DataType::Float64) else {
        warn!("energy column is not numeric; energy_norm left undefined");
        return Ok(vec![None; len]);
    };
    let values = series.f64()?;
    match values.max() {
        Some(max) if max > 0.0 => Ok(values
            .into_iter()
            .map(|value| value.map(|energy| energy / max))
            .collect()),
        _ => {
            warn!("energy metric has no positive values; energy_norm left undefined");
            Ok(vec![None; len])
        }
    }
}
