use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use crate::error::TrackError;
use crate::gps_data::Coordinates;
use crate::track::{Track, TrackPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Ele,
    Time,
    Sat,
    Hdop,
    Pdop,
    Fix,
    Speed,
}

fn field_for(local_name: &[u8]) -> Option<Field> {
    match local_name {
        b"ele" => Some(Field::Ele),
        b"time" => Some(Field::Time),
        b"sat" => Some(Field::Sat),
        b"hdop" => Some(Field::Hdop),
        b"pdop" => Some(Field::Pdop),
        b"fix" => Some(Field::Fix),
        b"speed" => Some(Field::Speed),
        _ => None,
    }
}

struct PointBuilder {
    lat: f64,
    lon: f64,
    ele: Option<f64>,
    time: Option<DateTime<Utc>>,
    sat: Option<u32>,
    hdop: Option<f64>,
    pdop: Option<f64>,
    fix: Option<u8>,
    speed: Option<f64>,
}

impl PointBuilder {
    fn from_attributes(e: &BytesStart<'_>) -> Result<Self, TrackError> {
        let mut lat = None;
        let mut lon = None;

        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let value = std::str::from_utf8(&attr.value)
                .map_err(|_| TrackError::InvalidPoint("attribute is not UTF-8".to_string()))?;
            match attr.key.local_name().as_ref() {
                b"lat" => lat = Some(parse_coordinate("lat", value)?),
                b"lon" => lon = Some(parse_coordinate("lon", value)?),
                _ => {}
            }
        }

        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(Self {
                lat,
                lon,
                ele: None,
                time: None,
                sat: None,
                hdop: None,
                pdop: None,
                fix: None,
                speed: None,
            }),
            _ => Err(TrackError::InvalidPoint("trkpt without lat/lon".to_string())),
        }
    }

    fn set(&mut self, field: Field, text: &str) {
        match field {
            Field::Ele => self.ele = text.parse().ok(),
            Field::Time => self.time = parse_time(text),
            Field::Sat => self.sat = text.parse().ok(),
            Field::Hdop => self.hdop = text.parse().ok(),
            Field::Pdop => self.pdop = text.parse().ok(),
            Field::Fix => {
                self.fix = match text.to_ascii_lowercase().as_str() {
                    "2d" => Some(2),
                    "3d" => Some(3),
                    _ => None,
                }
            }
            Field::Speed => self.speed = text.parse().ok(),
        }
    }

    fn build(self) -> Option<TrackPoint> {
        let time = self.time?;
        let mut coordinates = Coordinates::new(self.lat, self.lon);
        coordinates.alt = self.ele;

        Some(TrackPoint {
            time,
            coordinates,
            n_satellites: self.sat,
            hdop: self.hdop,
            pdop: self.pdop,
            fix_type: self.fix,
            speed: self.speed,
        })
    }
}

fn parse_coordinate(name: &str, value: &str) -> Result<f64, TrackError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| TrackError::InvalidPoint(format!("bad {} '{}'", name, value)))
}

/// GPX times are ISO 8601; a missing zone designator is taken as UTC.
pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parses the `trkpt` elements of a GPX document. Namespace prefixes are
/// ignored so GPX 1.0 `<speed>` and extension `<gpxtpx:speed>` both work.
pub fn parse_gpx(content: &str, source: &Path) -> Result<Track, TrackError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut points = Vec::new();
    let mut current: Option<PointBuilder> = None;
    let mut field: Option<Field> = None;
    let mut dropped = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == b"trkpt" {
                    current = Some(PointBuilder::from_attributes(&e)?);
                    field = None;
                } else if current.is_some() {
                    field = field_for(name.as_ref());
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"trkpt" {
                    // A point without children has no time.
                    PointBuilder::from_attributes(&e)?;
                    dropped += 1;
                }
            }
            Event::Text(t) => {
                if let (Some(builder), Some(f)) = (current.as_mut(), field) {
                    let text = t.unescape()?;
                    builder.set(f, text.trim());
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some(builder) = current.take() {
                        match builder.build() {
                            Some(point) => points.push(point),
                            None => dropped += 1,
                        }
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if dropped > 0 {
        trace!("{}: dropped {} track points without a valid time", source.display(), dropped);
    }
    if points.is_empty() {
        return Err(TrackError::Empty);
    }

    debug!("{}: parsed {} track points", source.display(), points.len());
    Ok(Track::new(source, points))
}

pub fn load_gpx_file(path: &Path) -> Result<Track, TrackError> {
    let content = fs::read_to_string(path)
        .map_err(|source| TrackError::Io { path: path.to_path_buf(), source })?;
    parse_gpx(&content, path)
}
