//! Core types for the location subsystem.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::error::MiqatError;
use crate::geo::{format_coords, GeoCoordinate};

/// How a location was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    Manual,
    Builtin,
    IpApi,
    Stored,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::Builtin => write!(f, "Built-in"),
            Self::IpApi => write!(f, "IP"),
            Self::Stored => write!(f, "Stored"),
        }
    }
}

/// A resolved location with coordinates, timezone, and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name.
    pub tz: String,
    pub source: LocationSource,
    /// ISO 3166-1 alpha-2 country code (e.g. "SA", "US")
    #[serde(default)]
    pub country_code: Option<String>,
}

impl ResolvedLocation {
    pub fn coordinate(&self) -> Result<GeoCoordinate, MiqatError> {
        GeoCoordinate::new(self.latitude, self.longitude)
    }

    /// Parsed timezone; unknown names fall back to UTC.
    pub fn timezone(&self) -> Tz {
        self.tz.parse().unwrap_or_else(|_| {
            warn!(tz = %self.tz, location = %self.name, "unknown timezone, using UTC");
            chrono_tz::UTC
        })
    }

    /// "Cairo, EG" or just the name when no country is known.
    pub fn display_name(&self) -> String {
        match &self.country_code {
            Some(cc) => format!("{}, {}", self.name, cc),
            None => self.name.clone(),
        }
    }

    pub fn display_line(&self) -> String {
        format!(
            "\u{1F4CD} {} ({})\n  \u{1F552} {} (Local Time)\n  \u{1F4D0} {}",
            self.display_name(),
            self.source,
            self.tz,
            format_coords(self.latitude, self.longitude)
        )
    }
}

/// Inputs a caller may supply; every field is optional.
#[derive(Debug, Clone, Default)]
pub struct LocationQuery {
    pub coordinates: Option<(f64, f64)>,
    pub tz: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Location not found: '{0}'")]
    NotFound(String),
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
    #[error("No location specified. Use --city or --lat/--lon, or allow IP lookup")]
    NoInput,
    #[error(transparent)]
    Invalid(#[from] MiqatError),
}

impl LocationError {
    /// Errors caused by the caller's own input stop the resolution chain;
    /// provider failures let the next provider try.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Invalid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cairo() -> ResolvedLocation {
        ResolvedLocation {
            name: "Cairo".into(),
            latitude: 30.0444,
            longitude: 31.2357,
            tz: "Africa/Cairo".into(),
            source: LocationSource::Builtin,
            country_code: Some("EG".into()),
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(cairo().display_name(), "Cairo, EG");
        let bare = ResolvedLocation { country_code: None, ..cairo() };
        assert_eq!(bare.display_name(), "Cairo");
    }

    #[test]
    fn test_timezone_parse_and_fallback() {
        assert_eq!(cairo().timezone(), chrono_tz::Africa::Cairo);
        let bad = ResolvedLocation { tz: "Mars/Olympus".into(), ..cairo() };
        assert_eq!(bad.timezone(), chrono_tz::UTC);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(cairo().coordinate().is_ok());
        let bad = ResolvedLocation { latitude: 120.0, ..cairo() };
        let err: LocationError = bad.coordinate().unwrap_err().into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_stored_document_without_country() {
        let json = r#"{"name":"Oslo","latitude":59.91,"longitude":10.75,"tz":"Europe/Oslo","source":"Stored"}"#;
        let loc: ResolvedLocation = serde_json::from_str(json).unwrap();
        assert!(loc.country_code.is_none());
        assert_eq!(loc.source, LocationSource::Stored);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(LocationError::NotFound("atlantis".into()).to_string(), "Location not found: 'atlantis'");
        assert!(!LocationError::Network("timeout".into()).is_fatal());
    }
}
