use geojson::{Feature, GeoJson, Geometry, Value};
use polars::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::outputs;
use crate::table::float_column;

/// Ordered (longitude, latitude) pairs for the route overlay, in row
/// order. Rows without coordinates are skipped. This is a derived view
/// over the enriched table, not stored state.
pub fn route_geometry(df: &DataFrame) -> Result<Vec<(f64, f64)>> {
    let longitude = float_column(df, "longitude")?;
    let latitude = float_column(df, "latitude")?;

    let mut pairs = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        if let (Some(lon), Some(lat)) = (longitude.get(idx), latitude.get(idx)) {
            pairs.push((lon, lat));
        }
    }
    Ok(pairs)
}

/// The route as a GeoJSON LineString feature for spatial plotting.
pub fn route_feature(df: &DataFrame) -> Result<Feature> {
    Ok(feature_from_pairs(&route_geometry(df)?))
}

/// Route-export stage: enriched table in, GeoJSON overlay atomically out.
pub fn run(config: &Config) -> Result<usize> {
    let df = outputs::read_csv(&config.enriched_csv_path)?;
    let pairs = route_geometry(&df)?;
    let points = pairs.len();
    let feature = feature_from_pairs(&pairs);

    outputs::write_string_atomic(
        &GeoJson::Feature(feature).to_string(),
        &config.route_geojson_path,
    )?;
    info!(
        points,
        output = %config.route_geojson_path.display(),
        "route geometry published"
    );
    Ok(points)
}

fn feature_from_pairs(pairs: &[(f64, f64)]) -> Feature {
    let coordinates: Vec<Vec<f64>> = pairs.iter().map(|(lon, lat)| vec![*lon, *lat]).collect();

    let mut properties = geojson::JsonObject::new();
    properties.insert("points".to_string(), serde_json::json!(pairs.len()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coordinates))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
