use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::gps_data::Coordinates;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub coordinates: Coordinates,
    pub n_satellites: Option<u32>,
    pub hdop: Option<f64>,
    pub pdop: Option<f64>,
    /// 2 for a 2D fix, 3 for a 3D fix.
    pub fix_type: Option<u8>,
    /// Meters per second.
    pub speed: Option<f64>,
}

impl TrackPoint {
    pub fn new(time: DateTime<Utc>, coordinates: Coordinates) -> Self {
        Self {
            time,
            coordinates,
            n_satellites: None,
            hdop: None,
            pdop: None,
            fix_type: None,
            speed: None,
        }
    }
}

/// A GPS track. Points are kept sorted by time.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub source: PathBuf,
    points: Vec<TrackPoint>,
}

impl Track {
    pub fn new(source: impl Into<PathBuf>, mut points: Vec<TrackPoint>) -> Self {
        points.sort_by_key(|p| p.time);
        Self { source: source.into(), points }
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.time)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.time)
    }

    /// Index of the first point at or after `time`.
    pub fn first_index_at_or_after(&self, time: DateTime<Utc>) -> usize {
        self.points.partition_point(|p| p.time < time)
    }

    pub fn coordinates(&self) -> Vec<Coordinates> {
        self.points.iter().map(|p| p.coordinates).collect()
    }
}
