use std::fs;
use std::path::{Path, PathBuf};

use trailmetrics_core::pipeline::{self, StageOutcome};
use trailmetrics_core::{extract, Config, PipelineError};

fn fixture_gpx() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/mini-course.gpx")
}

/// Builds an isolated working directory with the fixture recording copied
/// in, plus a Config pointing all artifacts inside it.
fn setup(name: &str) -> Config {
    let root = std::env::temp_dir().join(format!("trailmetrics-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).expect("failed to create test workspace");

    let gpx_path = root.join("course.gpx");
    fs::copy(fixture_gpx(), &gpx_path).expect("failed to copy fixture");

    Config {
        gpx_path,
        raw_csv_path: root.join("track-points.csv"),
        enriched_csv_path: root.join("track-points-enriched.csv"),
        route_geojson_path: root.join("course-route.geojson"),
        timezone: "America/New_York".to_string(),
    }
}

fn headers(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).expect("failed to open csv");
    reader
        .headers()
        .expect("failed to read csv headers")
        .iter()
        .map(|field| field.to_string())
        .collect()
}

#[test]
fn full_pipeline_produces_all_artifacts() {
    let config = setup("full");
    let report = pipeline::run(&config, false).expect("pipeline failed");

    assert_eq!(report.extract, StageOutcome::Regenerated);
    assert_eq!(report.enrich, StageOutcome::Regenerated);
    assert_eq!(report.route, StageOutcome::Regenerated);

    let raw_headers = headers(&config.raw_csv_path);
    assert_eq!(
        raw_headers,
        vec![
            "index",
            "latitude",
            "longitude",
            "elevation",
            "time",
            "cadence",
            "distance",
            "altitude",
            "energy"
        ]
    );

    let enriched_headers = headers(&config.enriched_csv_path);
    assert!(!enriched_headers.contains(&"altitude".to_string()));
    for kept in ["index", "latitude", "longitude", "elevation", "time", "cadence", "distance"] {
        assert!(
            enriched_headers.contains(&kept.to_string()),
            "missing original column '{kept}'"
        );
    }
    for derived in [
        "elevation_ft",
        "time_plot",
        "time_local",
        "distance_mile",
        "energy_norm",
        "speed_mph",
        "vertical_speed_ft_per_sec",
    ] {
        assert!(
            enriched_headers.contains(&derived.to_string()),
            "missing derived column '{derived}'"
        );
    }

    // one data row per recorded point, in both tables
    let raw_rows = csv::Reader::from_path(&config.raw_csv_path)
        .unwrap()
        .into_records()
        .count();
    let enriched_rows = csv::Reader::from_path(&config.enriched_csv_path)
        .unwrap()
        .into_records()
        .count();
    assert_eq!(raw_rows, 4);
    assert_eq!(enriched_rows, 4);

    let route = fs::read_to_string(&config.route_geojson_path).unwrap();
    assert!(route.contains("LineString"));
}

#[test]
fn second_run_skips_fresh_artifacts() {
    let config = setup("fresh");
    pipeline::run(&config, false).expect("first pipeline run failed");
    let report = pipeline::run(&config, false).expect("second pipeline run failed");

    assert_eq!(report.extract, StageOutcome::UpToDate);
    assert_eq!(report.enrich, StageOutcome::UpToDate);
    assert_eq!(report.route, StageOutcome::UpToDate);
}

#[test]
fn force_rerun_regenerates_everything() {
    let config = setup("force");
    pipeline::run(&config, false).expect("first pipeline run failed");
    let report = pipeline::run(&config, true).expect("forced pipeline run failed");

    assert_eq!(report.extract, StageOutcome::Regenerated);
    assert_eq!(report.enrich, StageOutcome::Regenerated);
    assert_eq!(report.route, StageOutcome::Regenerated);
}

#[test]
fn extractor_is_idempotent() {
    let config = setup("idempotent");
    extract::run(&config).expect("first extract failed");
    let first = fs::read(&config.raw_csv_path).unwrap();

    extract::run(&config).expect("second extract failed");
    let second = fs::read(&config.raw_csv_path).unwrap();

    assert_eq!(first, second, "extractor output differs between runs");
}

#[test]
fn raw_values_survive_into_the_enriched_table() {
    let config = setup("roundtrip");
    pipeline::run(&config, false).expect("pipeline failed");

    let raw_headers = headers(&config.raw_csv_path);
    let enriched_headers = headers(&config.enriched_csv_path);

    let mut raw = csv::Reader::from_path(&config.raw_csv_path).unwrap();
    let mut enriched = csv::Reader::from_path(&config.enriched_csv_path).unwrap();
    let raw_records: Vec<csv::StringRecord> =
        raw.records().collect::<std::result::Result<_, _>>().unwrap();
    let enriched_records: Vec<csv::StringRecord> = enriched
        .records()
        .collect::<std::result::Result<_, _>>()
        .unwrap();

    for (name, raw_idx) in raw_headers.iter().zip(0..) {
        if name == "altitude" {
            continue;
        }
        let enriched_idx = enriched_headers
            .iter()
            .position(|header| header == name)
            .unwrap_or_else(|| panic!("column '{name}' missing from enriched table"));
        for (raw_row, enriched_row) in raw_records.iter().zip(&enriched_records) {
            assert_eq!(
                raw_row.get(raw_idx),
                enriched_row.get(enriched_idx),
                "column '{name}' changed in enrichment"
            );
        }
    }
}

#[test]
fn missing_input_recording_fails_the_run() {
    let mut config = setup("missing-input");
    config.gpx_path = config.gpx_path.with_file_name("nonexistent.gpx");

    match pipeline::run(&config, false) {
        Err(PipelineError::Io(err)) => {
            assert_eq!(err.kind(), std::io::ErrorKind::NotFound)
        }
        other => panic!("expected Io error, got {other:?}"),
    }
    assert!(!config.raw_csv_path.exists(), "no partial artifact expected");
}

#[test]
fn malformed_recording_aborts_without_publishing() {
    let config = setup("malformed");
    fs::write(&config.gpx_path, "<gpx><trk><trkseg>").unwrap();

    assert!(matches!(
        pipeline::run(&config, false),
        Err(PipelineError::Gpx(_))
    ));
    assert!(!config.raw_csv_path.exists(), "no partial artifact expected");
}

#[test]
fn edited_recording_marks_downstream_stale() {
    let config = setup("stale");
    pipeline::run(&config, false).expect("first pipeline run failed");

    // touch the recording with a strictly newer mtime
    std::thread::sleep(std::time::Duration::from_millis(20));
    let content = fs::read_to_string(&config.gpx_path).unwrap();
    fs::write(&config.gpx_path, content).unwrap();

    let report = pipeline::run(&config, false).expect("second pipeline run failed");
    assert_eq!(report.extract, StageOutcome::Regenerated);
    assert_eq!(report.enrich, StageOutcome::Regenerated);
    assert_eq!(report.route, StageOutcome::Regenerated);
}
