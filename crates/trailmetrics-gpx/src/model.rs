use chrono::{DateTime, SecondsFormat, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::GpxError;

/// Fixed columns present in every extracted table, ahead of the
/// track-dependent extension columns.
pub const CORE_COLUMNS: [&str; 5] = ["index", "latitude", "longitude", "elevation", "time"];

/// One recorded position in file traversal order. Extension metrics keep
/// their namespace-stripped element names and per-point order of appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub extensions: Vec<(String, f64)>,
}

impl TrackPoint {
    /// Last recorded value for a named extension metric on this point.
    pub fn extension(&self, name: &str) -> Option<f64> {
        self.extensions
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub creator: Option<String>,
    pub track_name: Option<String>,
    pub segment_count: usize,
}

#[derive(Debug, Clone)]
pub struct TrackLog {
    pub metadata: TrackMetadata,
    pub points: Vec<TrackPoint>,
}

impl TrackLog {
    /// Union of extension-metric names over all points, in first-observed
    /// order. The extracted table carries one column per name; points
    /// lacking a metric contribute nulls, never zeros.
    pub fn extension_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for point in &self.points {
            for (name, _) in &point.extensions {
                if !names.iter().any(|seen| seen == name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Materializes the flat per-point table: the core columns followed by
    /// one Float64 column per discovered extension metric. Values are
    /// carried over exactly as recorded; timestamps serialize as RFC 3339
    /// UTC strings.
    pub fn to_dataframe(&self) -> Result<DataFrame, GpxError> {
        let len = self.points.len();

        let mut index = Vec::with_capacity(len);
        let mut latitude = Vec::with_capacity(len);
        let mut longitude = Vec::with_capacity(len);
        let mut elevation = Vec::with_capacity(len);
        let mut time: Vec<Option<String>> = Vec::with_capacity(len);

        for (idx, point) in self.points.iter().enumerate() {
            index.push(idx as u32);
            latitude.push(point.latitude);
            longitude.push(point.longitude);
            elevation.push(point.elevation);
            time.push(
                point
                    .time
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
        }

        let mut columns: Vec<Column> = vec![
            Series::new("index".into(), index).into(),
            Series::new("latitude".into(), latitude).into(),
            Series::new("longitude".into(), longitude).into(),
            Series::new("elevation".into(), elevation).into(),
            Series::new("time".into(), time).into(),
        ];

        for name in self.extension_names() {
            let values: Vec<Option<f64>> = self
                .points
                .iter()
                .map(|point| point.extension(name))
                .collect();
            columns.push(Series::new(name.into(), values).into());
        }

        Ok(DataFrame::new(columns)?)
    }
}
