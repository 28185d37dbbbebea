//! Geographic coordinate value type.

use serde::{Deserialize, Serialize};

use crate::error::{MiqatError, Result};

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(MiqatError::InvalidCoordinate { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }
}

/// Format coordinates as `21.4225°N, 39.8262°E`.
pub fn format_coords(lat: f64, lon: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}°{}, {:.4}°{}", lat.abs(), ns, lon.abs(), ew)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinate() {
        let c = GeoCoordinate::new(21.3891, 39.8579).unwrap();
        assert_eq!(c.latitude, 21.3891);
        assert_eq!(c.longitude, 39.8579);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(GeoCoordinate::new(90.0, 180.0).is_ok());
        assert!(GeoCoordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_invalid_latitude() {
        let err = GeoCoordinate::new(91.0, 0.0).unwrap_err();
        assert!(matches!(err, MiqatError::InvalidCoordinate { .. }));
    }

    #[test]
    fn test_invalid_longitude() {
        assert!(GeoCoordinate::new(0.0, -180.5).is_err());
        assert!(GeoCoordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_format_coords() {
        assert_eq!(format_coords(21.4225, 39.8262), "21.4225°N, 39.8262°E");
        assert_eq!(format_coords(-33.8688, -70.6693), "33.8688°S, 70.6693°W");
    }
}
