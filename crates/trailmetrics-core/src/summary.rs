use chrono::{DateTime, Utc};
use polars::prelude::*;

use crate::enrich::VERTICAL_SPEED_COLUMN;
use crate::error::{PipelineError, Result};
use crate::table::float_column;

/// Whole-track statistics over the enriched table. Aggregates ignore
/// missing values; a metric with no defined values reports as absent
/// rather than zero.
#[derive(Debug, Clone, Default)]
pub struct TrackSummary {
    pub points: usize,
    pub start_time_local: Option<String>,
    pub end_time_local: Option<String>,
    pub duration_seconds: Option<i64>,
    pub total_distance_mile: Option<f64>,
    pub elevation_gain_ft: Option<f64>,
    pub elevation_loss_ft: Option<f64>,
    pub min_elevation_ft: Option<f64>,
    pub max_elevation_ft: Option<f64>,
    pub mean_speed_mph: Option<f64>,
    pub max_speed_mph: Option<f64>,
    pub mean_cadence: Option<f64>,
}

pub fn summarize(df: &DataFrame) -> Result<TrackSummary> {
    let elevation_ft = float_column(df, "elevation_ft")?;
    let distance_mile = float_column(df, "distance_mile")?;
    let speed_mph = float_column(df, "speed_mph")?;
    // presence of the derived vertical-speed column marks the table as
    // enriched; summarizing a raw table is a caller mistake
    if df.column(VERTICAL_SPEED_COLUMN).is_err() {
        return Err(PipelineError::MissingColumn {
            column: VERTICAL_SPEED_COLUMN.to_string(),
        });
    }

    let (gain, loss) = elevation_deltas(&elevation_ft);
    let (start_local, end_local) = local_time_bounds(df)?;

    Ok(TrackSummary {
        points: df.height(),
        start_time_local: start_local,
        end_time_local: end_local,
        duration_seconds: duration_seconds(df)?,
        total_distance_mile: distance_mile.max(),
        elevation_gain_ft: gain,
        elevation_loss_ft: loss,
        min_elevation_ft: elevation_ft.min(),
        max_elevation_ft: elevation_ft.max(),
        mean_speed_mph: speed_mph.mean(),
        max_speed_mph: speed_mph.max(),
        mean_cadence: match df.column("cadence") {
            Ok(column) => column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .ok()
                .and_then(|series| series.f64().ok().and_then(|values| values.mean())),
            Err(_) => None,
        },
    })
}

/// Total climb and total descent, summed over consecutive pairs where both
/// elevations are defined.
fn elevation_deltas(elevation_ft: &Float64Chunked) -> (Option<f64>, Option<f64>) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut any = false;
    let mut prev: Option<f64> = None;

    for value in elevation_ft.into_iter() {
        if let (Some(previous), Some(current)) = (prev, value) {
            any = true;
            let delta = current - previous;
            if delta > 0.0 {
                gain += delta;
            } else {
                loss += -delta;
            }
        }
        if value.is_some() {
            prev = value;
        }
    }

    if any {
        (Some(gain), Some(loss))
    } else {
        (None, None)
    }
}

fn local_time_bounds(df: &DataFrame) -> Result<(Option<String>, Option<String>)> {
    let Ok(column) = df.column("time_local") else {
        return Ok((None, None));
    };
    let series = column.as_materialized_series();
    if series.dtype() == &DataType::Null {
        return Ok((None, None));
    }
    let strings = series
        .str()
        .map_err(|_| PipelineError::Validation("column 'time_local' is not a string column".into()))?;

    let mut first = None;
    let mut last = None;
    for value in strings.into_iter().flatten() {
        if first.is_none() {
            first = Some(value.to_string());
        }
        last = Some(value.to_string());
    }
    Ok((first, last))
}

fn duration_seconds(df: &DataFrame) -> Result<Option<i64>> {
    let Ok(column) = df.column("time") else {
        return Ok(None);
    };
    let series = column.as_materialized_series();
    if series.dtype() == &DataType::Null {
        return Ok(None);
    }
    let strings = series
        .str()
        .map_err(|_| PipelineError::Validation("column 'time' is not a string column".into()))?;

    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;
    for value in strings.into_iter().flatten() {
        let parsed = DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                PipelineError::Validation(format!("invalid timestamp '{value}' in time column"))
            })?;
        if first.is_none() {
            first = Some(parsed);
        }
        last = Some(parsed);
    }

    Ok(match (first, last) {
        (Some(start), Some(end)) => Some((end - start).num_seconds()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich_dataframe;
    use polars::df;

    fn enriched_fixture() -> DataFrame {
        let raw = df![
            "index" => [0u32, 1, 2, 3],
            "latitude" => [44.5281, 44.5284, 44.5287, 44.5290],
            "longitude" => [-72.7828, -72.7840, -72.7853, -72.7864],
            "elevation" => [100.0, 110.0, 90.0, 95.0],
            "time" => [
                "2017-08-26T13:00:00Z",
                "2017-08-26T13:00:10Z",
                "2017-08-26T13:00:20Z",
                "2017-08-26T13:00:30Z",
            ],
            "distance" => [0.0, 15.0, 32.0, 50.0],
            "energy" => [1.0, 2.0, 4.0, 3.0],
            "cadence" => [80.0, 82.0, 81.0, 79.0],
        ]
        .unwrap();
        enrich_dataframe(&raw, chrono_tz::America::New_York).unwrap()
    }

    #[test]
    fn gain_and_loss_come_from_signed_deltas() {
        let summary = summarize(&enriched_fixture()).unwrap();
        // +10 m, -20 m, +5 m in feet
        let gain = summary.elevation_gain_ft.unwrap();
        let loss = summary.elevation_loss_ft.unwrap();
        assert!((gain - 15.0 * 3.28084).abs() < 1e-9);
        assert!((loss - 20.0 * 3.28084).abs() < 1e-9);
    }

    #[test]
    fn duration_and_distance_span_the_whole_track() {
        let summary = summarize(&enriched_fixture()).unwrap();
        assert_eq!(summary.points, 4);
        assert_eq!(summary.duration_seconds, Some(30));
        assert!((summary.total_distance_mile.unwrap() - 50.0 * 0.000621371).abs() < 1e-12);
        assert_eq!(
            summary.start_time_local.as_deref(),
            Some("2017-08-26 09:00:00")
        );
    }

    #[test]
    fn summarizing_a_raw_table_is_an_error() {
        let raw = df![
            "latitude" => [44.0],
            "longitude" => [-72.0],
            "elevation" => [100.0],
            "time" => ["2017-08-26T13:00:00Z"],
            "distance" => [0.0],
        ]
        .unwrap();
        assert!(matches!(
            summarize(&raw),
            Err(PipelineError::MissingColumn { .. })
        ));
    }
}
