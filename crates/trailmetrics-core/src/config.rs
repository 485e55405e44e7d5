use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};

/// Explicit pipeline configuration. Every stage receives this struct
/// instead of reading process-wide state; paths are resolved relative to
/// the working directory the pipeline is invoked from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source GPX recording.
    pub gpx_path: PathBuf,
    /// Extracted per-point table.
    pub raw_csv_path: PathBuf,
    /// Derived-metrics table.
    pub enriched_csv_path: PathBuf,
    /// Route overlay geometry for spatial plotting.
    pub route_geojson_path: PathBuf,
    /// IANA timezone for the local-civil-time derivation.
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gpx_path: PathBuf::from("data/raw/course.gpx"),
            raw_csv_path: PathBuf::from("data/processed/track-points.csv"),
            enriched_csv_path: PathBuf::from("data/processed/track-points-enriched.csv"),
            route_geojson_path: PathBuf::from("data/processed/course-route.geojson"),
            timezone: "America/New_York".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration with the usual resolution order: an explicit
    /// path wins, then the `TRAILMETRICS_CONFIG` environment variable,
    /// then `trailmetrics.toml` in the working directory if present,
    /// otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var("TRAILMETRICS_CONFIG") {
            return Self::from_file(Path::new(&path));
        }
        let default_path = Path::new("trailmetrics.toml");
        if default_path.exists() {
            return Self::from_file(default_path);
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("cannot read config {}: {err}", path.display()))
        })?;
        let config: Config = toml::from_str(&content).map_err(|err| {
            PipelineError::Config(format!("cannot parse config {}: {err}", path.display()))
        })?;
        info!(config = %path.display(), "loaded pipeline configuration");
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.tz()?;
        Ok(())
    }

    /// Resolves the configured timezone name.
    pub fn tz(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone)
            .map_err(|_| PipelineError::Config(format!("unknown timezone '{}'", self.timezone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves_timezone() {
        let config = Config::default();
        assert_eq!(config.tz().unwrap(), chrono_tz::America::New_York);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(r#"gpx_path = "race.gpx""#).unwrap();
        assert_eq!(config.gpx_path, PathBuf::from("race.gpx"));
        assert_eq!(config.timezone, "America/New_York");
    }

    #[test]
    fn unknown_timezone_is_a_config_error() {
        let config = Config {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.tz(), Err(PipelineError::Config(_))));
    }
}
