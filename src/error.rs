//! Error taxonomy for the prayer-time core.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors produced by the calculation core.
///
/// Unknown method names and solvable high-latitude days are recovered
/// locally and never show up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MiqatError {
    /// Latitude outside [-90, 90] or longitude outside [-180, 180].
    #[error("Invalid coordinates ({latitude}, {longitude}). Lat: -90..90, Lon: -180..180")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// The sun never reaches the angle required by `event` on `date`
    /// and the high-latitude rule is disabled.
    #[error("No solar solution for {event} on {date}")]
    NoSolarSolution { event: &'static str, date: NaiveDate },

    /// Strict method lookup failed. `resolve_method` never returns this.
    #[error("Unknown calculation method '{0}'")]
    UnknownMethod(String),

    #[error("Hijri conversion failed: {reason}")]
    HijriConversion { reason: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

impl MiqatError {
    pub fn hijri(reason: impl Into<String>) -> Self {
        Self::HijriConversion { reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, MiqatError>;
