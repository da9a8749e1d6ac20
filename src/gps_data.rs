use geo::{Distance, Geodesic, Point};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, alt: None }
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }

    pub fn has_altitude(&self) -> bool {
        self.alt.is_some()
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Geodesic distance in meters.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        Geodesic.distance(self.to_point(), other.to_point())
    }
}

/// GPS information attached to a photo. Every field is optional; zero is a
/// legitimate satellite count or DOP and is never used to mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_satellites: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dop: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl GpsData {
    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }
}
