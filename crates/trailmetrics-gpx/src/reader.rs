use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::GpxError;
use crate::model::{TrackLog, TrackMetadata, TrackPoint};

/// Parses GPX content into a [`TrackLog`], walking `trk`/`trkseg`/`trkpt`
/// elements in document order. Points outside a track segment are ignored
/// (waypoints and routes are not part of the recording). Numeric leaf
/// elements under `<extensions>` become extension metrics keyed by their
/// namespace-stripped local name; non-numeric leaves are not metrics and
/// are skipped.
pub fn parse_track_log(content: &str) -> Result<TrackLog, GpxError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut saw_gpx = false;
    let mut metadata = TrackMetadata::default();
    let mut points: Vec<TrackPoint> = Vec::new();
    let mut current: Option<TrackPoint> = None;
    let mut pending_text: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let local = local_name(&e);
                pending_text = None;

                if stack.is_empty() {
                    if local != "gpx" {
                        return Err(GpxError::NotGpx {
                            reason: format!("root element is '<{local}>'"),
                        });
                    }
                    saw_gpx = true;
                    metadata.creator = attribute(&e, b"creator")?;
                } else {
                    match local.as_str() {
                        "trkseg" if parent_is(&stack, "trk") => {
                            metadata.segment_count += 1;
                        }
                        "trkpt" if parent_is(&stack, "trkseg") => {
                            let (latitude, longitude) = parse_coordinates(&e, points.len())?;
                            current = Some(TrackPoint {
                                latitude,
                                longitude,
                                elevation: None,
                                time: None,
                                extensions: Vec::new(),
                            });
                        }
                        _ => {}
                    }
                }
                stack.push(local);
            }

            Event::Empty(e) => {
                let local = local_name(&e);
                pending_text = None;

                if stack.is_empty() {
                    if local != "gpx" {
                        return Err(GpxError::NotGpx {
                            reason: format!("root element is '<{local}>'"),
                        });
                    }
                    saw_gpx = true;
                    metadata.creator = attribute(&e, b"creator")?;
                } else if local == "trkpt" && parent_is(&stack, "trkseg") {
                    let (latitude, longitude) = parse_coordinates(&e, points.len())?;
                    points.push(TrackPoint {
                        latitude,
                        longitude,
                        elevation: None,
                        time: None,
                        extensions: Vec::new(),
                    });
                }
            }

            Event::Text(t) => {
                pending_text = Some(t.unescape()?.into_owned());
            }

            Event::End(e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.pop();
                let text = pending_text.take();

                if current.is_some() && stack.iter().any(|name| name == "extensions") {
                    if let Some(value) = text.as_deref().and_then(|v| v.trim().parse::<f64>().ok())
                    {
                        if let Some(point) = current.as_mut() {
                            point.extensions.push((local, value));
                        }
                    }
                    continue;
                }

                match local.as_str() {
                    "trkpt" => {
                        if let Some(point) = current.take() {
                            points.push(point);
                        }
                    }
                    "ele" if current.is_some() && parent_is(&stack, "trkpt") => {
                        if let Some(value) = text {
                            let parsed = value.trim().parse::<f64>().map_err(|_| {
                                GpxError::Point {
                                    index: points.len(),
                                    message: format!("invalid elevation '{}'", value.trim()),
                                }
                            })?;
                            if let Some(point) = current.as_mut() {
                                point.elevation = Some(parsed);
                            }
                        }
                    }
                    "time" if current.is_some() && parent_is(&stack, "trkpt") => {
                        if let Some(value) = text {
                            let parsed = parse_time(&value, points.len())?;
                            if let Some(point) = current.as_mut() {
                                point.time = Some(parsed);
                            }
                        }
                    }
                    "name" if stack.len() == 2 && parent_is(&stack, "trk") => {
                        if metadata.track_name.is_none() {
                            metadata.track_name = text;
                        }
                    }
                    _ => {}
                }
            }

            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_gpx {
        return Err(GpxError::NotGpx {
            reason: "no <gpx> root element".to_string(),
        });
    }

    Ok(TrackLog { metadata, points })
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn parent_is(stack: &[String], name: &str) -> bool {
    stack.last().map(String::as_str) == Some(name)
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>, GpxError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            let value = String::from_utf8_lossy(attr.value.as_ref()).trim().to_string();
            if !value.is_empty() {
                return Ok(Some(value));
            }
        }
    }
    Ok(None)
}

fn parse_coordinates(e: &BytesStart, index: usize) -> Result<(f64, f64), GpxError> {
    let latitude = required_coordinate(e, b"lat", "lat", index)?;
    let longitude = required_coordinate(e, b"lon", "lon", index)?;
    Ok((latitude, longitude))
}

fn required_coordinate(
    e: &BytesStart,
    key: &[u8],
    name: &str,
    index: usize,
) -> Result<f64, GpxError> {
    let raw = attribute(e, key)?.ok_or_else(|| GpxError::Point {
        index,
        message: format!("missing required attribute '{name}'"),
    })?;
    raw.parse::<f64>().map_err(|_| GpxError::Point {
        index,
        message: format!("invalid {name} '{raw}'"),
    })
}

fn parse_time(value: &str, index: usize) -> Result<DateTime<Utc>, GpxError> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Some recorders omit the timezone designator; those stamps are UTC.
    static FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.and_utc());
        }
    }
    Err(GpxError::Timestamp {
        index,
        value: trimmed.to_string(),
    })
}
