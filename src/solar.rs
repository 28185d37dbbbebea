//! Solar position calculator (NOAA / Meeus low-precision formulation).
//!
//! Provides the two quantities the prayer engine needs for a day, solar
//! declination and the equation of time, plus the hour-angle solution that
//! turns a sun altitude into an offset from solar transit.
//! Accuracy: ~0.01° for dates within ±50 years of J2000.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::f64::consts::PI;

use crate::geo::GeoCoordinate;

const DEG: f64 = PI / 180.0;
const ATMOSPHERIC_REFRACTION: f64 = 0.833;

/// Refraction + semidiameter adjusted horizon altitude used for sunrise and sunset.
pub const HORIZON_ALTITUDE: f64 = -ATMOSPHERIC_REFRACTION;

/// Solar position at a specific instant.
#[derive(Debug, Clone, Copy)]
pub struct SolarPosition {
    pub altitude: f64,
    pub azimuth: f64,
    pub declination: f64,
    pub equation_of_time: f64,
}

/// Daily solar parameters at one longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunTimes {
    /// Solar declination in degrees.
    pub declination: f64,
    /// Equation of time in minutes (apparent minus mean solar time).
    pub equation_of_time: f64,
    /// Solar transit in fractional hours UTC.
    pub transit: f64,
}

impl SunTimes {
    /// Hours between transit and the instant the sun sits at `altitude`.
    ///
    /// Returns `None` when the sun never reaches that altitude at this
    /// latitude on this day.
    pub fn hour_angle(&self, altitude: f64, latitude: f64) -> Option<f64> {
        let phi = latitude * DEG;
        let delta = self.declination * DEG;
        let cos_h = ((altitude * DEG).sin() - phi.sin() * delta.sin()) / (phi.cos() * delta.cos());
        if !cos_h.is_finite() || cos_h.abs() > 1.0 {
            return None;
        }
        Some(cos_h.acos() / DEG / 15.0)
    }

    /// Sun altitude at which the shadow length equals `shadow_factor`
    /// object heights plus the noon shadow.
    ///
    /// `cot(a) = factor + tan(|φ − δ|)`. `None` when the sun stays below
    /// the horizon at transit.
    pub fn asr_altitude(&self, shadow_factor: f64, latitude: f64) -> Option<f64> {
        let noon_zenith = (latitude - self.declination).abs();
        if noon_zenith >= 90.0 {
            return None;
        }
        let cot = shadow_factor + (noon_zenith * DEG).tan();
        Some((1.0 / cot).atan() / DEG)
    }

    /// Altitude of the sun at transit.
    pub fn transit_altitude(&self, latitude: f64) -> f64 {
        90.0 - (latitude - self.declination).abs()
    }
}

/// Convert a NaiveDateTime (assumed UTC) to Julian Date.
pub fn julian_date(dt: &NaiveDateTime) -> f64 {
    let y = dt.year() as f64;
    let m = dt.month() as f64;
    let d = dt.day() as f64;
    let h = dt.hour() as f64 + dt.minute() as f64 / 60.0 + dt.second() as f64 / 3600.0;

    let (y2, m2) = if m <= 2.0 {
        (y - 1.0, m + 12.0)
    } else {
        (y, m)
    };

    let a = (y2 / 100.0_f64).floor();
    let b = 2.0 - a + (a / 4.0_f64).floor();

    (365.25_f64 * (y2 + 4716.0)).floor()
        + (30.6001_f64 * (m2 + 1.0)).floor()
        + d
        + h / 24.0
        + b
        - 1524.5
}

fn julian_century(jd: f64) -> f64 {
    (jd - 2451545.0) / 36525.0
}

fn normalize_degrees(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    d
}

fn sun_mean_longitude(t: f64) -> f64 {
    normalize_degrees(280.46646 + t * (36000.76983 + t * 0.0003032))
}

fn sun_mean_anomaly(t: f64) -> f64 {
    normalize_degrees(357.52911 + t * (35999.05029 - t * 0.0001537))
}

fn earth_eccentricity(t: f64) -> f64 {
    0.016708634 - t * (0.000042037 + t * 0.0000001267)
}

fn sun_equation_of_center(t: f64) -> f64 {
    let m = sun_mean_anomaly(t) * DEG;
    m.sin() * (1.914602 - t * (0.004817 + t * 0.000014))
        + (2.0 * m).sin() * (0.019993 - t * 0.000101)
        + (3.0 * m).sin() * 0.000289
}

fn sun_apparent_longitude(t: f64) -> f64 {
    let omega = 125.04 - 1934.136 * t;
    sun_mean_longitude(t) + sun_equation_of_center(t) - 0.00569 - 0.00478 * (omega * DEG).sin()
}

fn obliquity_corrected(t: f64) -> f64 {
    let mean = 23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    let omega = 125.04 - 1934.136 * t;
    mean + 0.00256 * (omega * DEG).cos()
}

fn solar_declination(t: f64) -> f64 {
    let e = obliquity_corrected(t) * DEG;
    let lambda = sun_apparent_longitude(t) * DEG;
    (e.sin() * lambda.sin()).asin() / DEG
}

fn equation_of_time(t: f64) -> f64 {
    let e = obliquity_corrected(t) * DEG;
    let l0 = sun_mean_longitude(t) * DEG;
    let ecc = earth_eccentricity(t);
    let m = sun_mean_anomaly(t) * DEG;

    let y = (e / 2.0).tan().powi(2);

    let eq = y * (2.0 * l0).sin() - 2.0 * ecc * m.sin()
        + 4.0 * ecc * y * m.sin() * (2.0 * l0).cos()
        - 0.5 * y * y * (4.0 * l0).sin()
        - 1.25 * ecc * ecc * (2.0 * m).sin();

    4.0 * eq / DEG
}

/// Solar parameters for `date`, evaluated at the location's approximate local noon.
pub fn sun_times(date: NaiveDate, coordinate: GeoCoordinate) -> SunTimes {
    let local_noon = 12.0 - coordinate.longitude / 15.0;
    sun_times_at(date, local_noon, coordinate.longitude)
}

/// Solar parameters evaluated at `utc_hours` past midnight UTC on `date`.
///
/// `utc_hours` may fall outside 0..24; the Julian date simply extends
/// into the neighbouring day.
pub fn sun_times_at(date: NaiveDate, utc_hours: f64, longitude: f64) -> SunTimes {
    let jd = julian_date(&date.and_time(NaiveTime::MIN)) + utc_hours / 24.0;
    let t = julian_century(jd);
    let declination = solar_declination(t);
    let eot = equation_of_time(t);
    SunTimes {
        declination,
        equation_of_time: eot,
        transit: 12.0 - longitude / 15.0 - eot / 60.0,
    }
}

/// Compute the solar position for a given UTC datetime, latitude, and longitude.
pub fn solar_position(dt: &NaiveDateTime, lat: f64, lon: f64) -> SolarPosition {
    let t = julian_century(julian_date(dt));

    let decl = solar_declination(t);
    let eqt = equation_of_time(t);

    let hour = dt.hour() as f64 + dt.minute() as f64 / 60.0 + dt.second() as f64 / 3600.0;
    let solar_time = hour * 60.0 + eqt + 4.0 * lon;
    let hour_angle = solar_time / 4.0 - 180.0;

    let lat_r = lat * DEG;
    let decl_r = decl * DEG;
    let ha_r = hour_angle * DEG;

    let sin_alt = lat_r.sin() * decl_r.sin() + lat_r.cos() * decl_r.cos() * ha_r.cos();
    let altitude = sin_alt.asin() / DEG;

    let zenith = sin_alt.asin();
    let azimuth = if lat_r.cos().abs() > 1e-10 {
        let cos_az = (decl_r.sin() - zenith.sin() * lat_r.sin()) / (zenith.cos() * lat_r.cos());
        let az = cos_az.clamp(-1.0, 1.0).acos() / DEG;
        if hour_angle > 0.0 { 360.0 - az } else { az }
    } else if decl > 0.0 {
        180.0
    } else {
        0.0
    };

    SolarPosition {
        altitude,
        azimuth: normalize_degrees(azimuth),
        declination: decl,
        equation_of_time: eqt,
    }
}
