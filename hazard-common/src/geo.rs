//! Geodetic helpers
//!
//! Locations are longitude/latitude in decimal degrees plus depth in km
//! (positive down). Distances are great-circle distances on a spherical
//! Earth.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in km
pub const EARTH_RADIUS: f64 = 6371.0;

/// A location on or below the Earth surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
    /// Depth in km, positive down
    #[serde(default)]
    pub depth: f64,
}

impl Point {
    pub fn new(longitude: f64, latitude: f64, depth: f64) -> Self {
        Self {
            longitude,
            latitude,
            depth,
        }
    }

    /// Point at the surface
    pub fn surface(longitude: f64, latitude: f64) -> Self {
        Self::new(longitude, latitude, 0.0)
    }

    /// Great-circle distance (km) between the surface projections
    pub fn epicentral_distance(&self, other: &Point) -> f64 {
        geodetic_distance(self.longitude, self.latitude, other.longitude, other.latitude)
    }

    /// Straight-line distance (km) taking depths into account
    pub fn distance(&self, other: &Point) -> f64 {
        let horizontal = self.epicentral_distance(other);
        let vertical = self.depth - other.depth;
        (horizontal * horizontal + vertical * vertical).sqrt()
    }
}

/// Haversine great-circle distance in km between two lon/lat pairs
pub fn geodetic_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );
    let a = ((lat1 - lat2) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon1 - lon2) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().clamp(0.0, 1.0).asin()
}

/// Smallest epicentral distance from `target` to any of `points`.
///
/// Returns `f64::INFINITY` for an empty slice.
pub fn min_epicentral_distance(points: &[Point], target: &Point) -> f64 {
    points
        .iter()
        .map(|p| p.epicentral_distance(target))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Point::surface(10.0, 45.0);
        assert_eq!(p.epicentral_distance(&p), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = Point::surface(0.0, 0.0);
        let b = Point::surface(0.0, 1.0);
        // 2 * pi * R / 360
        let expected = EARTH_RADIUS * std::f64::consts::PI / 180.0;
        assert!((a.epicentral_distance(&b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_distance_includes_depth() {
        let a = Point::surface(0.0, 0.0);
        let b = Point::new(0.0, 0.0, 10.0);
        assert!((a.distance(&b) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_distance_empty_is_infinite() {
        assert!(min_epicentral_distance(&[], &Point::surface(0.0, 0.0)).is_infinite());
    }
}
