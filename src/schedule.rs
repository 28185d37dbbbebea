//! Prayer time engine.
//!
//! Every event is an hour angle either side of solar transit, refined by
//! re-evaluating the sun at the event instant. When the sun never reaches
//! an event's altitude the high-latitude rule takes over: horizon and Asr
//! events are projected from a reference latitude, twilight events are
//! bounded by a portion of the night. Days that needed either fallback
//! are flagged through `sources`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MiqatError, Result};
use crate::geo::GeoCoordinate;
use crate::method::{self, CalculationMethod, CalculationParameters, HighLatitudeRule, IshaRule, Rounding};
use crate::solar::{self, HORIZON_ALTITUDE};

/// Re-evaluations of the sun at the estimated event instant.
const REFINEMENTS: usize = 2;

/// Degrees the reference latitude moves toward 45° per projection attempt.
const PROJECTION_STEP: f64 = 5.0;

/// Hours a projected event must lie from transit; references where the sun
/// barely clears the horizon are skipped.
const MIN_PROJECTED_OFFSET: f64 = 1.0;

/// Smallest gap between consecutive events, so minute rounding keeps them apart.
const MIN_GAP: f64 = 1.0 / 60.0;

/// How a prayer time was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeSource {
    /// Solved from the event's own sun altitude.
    #[default]
    Standard,
    /// Bounded by a portion of the night (high-latitude rule).
    NightPortion,
    /// Projected from an adaptive reference latitude.
    Projected,
}

impl std::fmt::Display for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeSource::Standard => write!(f, "Standard"),
            TimeSource::NightPortion => write!(f, "NightPortion"),
            TimeSource::Projected => write!(f, "Projected"),
        }
    }
}

/// Per-event derivation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sources {
    pub fajr: TimeSource,
    pub sunrise: TimeSource,
    pub dhuhr: TimeSource,
    pub asr: TimeSource,
    pub maghrib: TimeSource,
    pub isha: TimeSource,
}

impl Sources {
    pub fn all(&self) -> [(&'static str, TimeSource); 6] {
        [
            ("fajr", self.fajr),
            ("sunrise", self.sunrise),
            ("dhuhr", self.dhuhr),
            ("asr", self.asr),
            ("maghrib", self.maghrib),
            ("isha", self.isha),
        ]
    }
}

/// Prayer times for one location and one date, in UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerTimeSet {
    pub date: NaiveDate,
    pub coordinate: GeoCoordinate,
    pub params: CalculationParameters,
    pub fajr: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub dhuhr: DateTime<Utc>,
    pub asr: DateTime<Utc>,
    pub maghrib: DateTime<Utc>,
    pub isha: DateTime<Utc>,
    /// Start of the last third of the night.
    pub qiyam: DateTime<Utc>,
    pub sources: Sources,
}

impl PrayerTimeSet {
    pub fn method(&self) -> CalculationMethod {
        self.params.method
    }

    /// True when any event needed a high-latitude fallback.
    pub fn is_adjusted(&self) -> bool {
        self.sources.all().iter().any(|(_, s)| *s != TimeSource::Standard)
    }

    /// All seven events in chronological order for a normal day.
    pub fn events(&self) -> [(&'static str, DateTime<Utc>); 7] {
        [
            ("fajr", self.fajr),
            ("sunrise", self.sunrise),
            ("dhuhr", self.dhuhr),
            ("asr", self.asr),
            ("maghrib", self.maghrib),
            ("isha", self.isha),
            ("qiyam", self.qiyam),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Rising,
    Setting,
}

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Rising => -1.0,
            Side::Setting => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Altitude(f64),
    /// Asr altitude for a shadow factor; depends on the declination.
    Asr(f64),
}

/// Event times for one day as fractional hours past 00:00 UTC.
#[derive(Debug, Clone, Copy)]
struct DayHours {
    fajr: f64,
    sunrise: f64,
    dhuhr: f64,
    asr: f64,
    maghrib: f64,
    isha: f64,
    sources: Sources,
}

impl DayHours {
    fn sunlit_ordered(&self) -> bool {
        [self.sunrise, self.dhuhr, self.asr, self.maghrib]
            .windows(2)
            .all(|w| w[0] + MIN_GAP <= w[1])
    }
}

/// Whether horizon and Asr events are solved at the location first or
/// projected straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Horizon {
    Direct,
    Projected,
}

/// Solve `target` on one side of transit. `None` when the sun never
/// reaches the required altitude.
fn solve_event(date: NaiveDate, coordinate: GeoCoordinate, target: Target, side: Side) -> Option<f64> {
    let mut sun = solar::sun_times(date, coordinate);
    let mut hours = None;
    for _ in 0..=REFINEMENTS {
        let altitude = match target {
            Target::Altitude(a) => a,
            Target::Asr(factor) => sun.asr_altitude(factor, coordinate.latitude)?,
        };
        let t = sun.transit + side.sign() * sun.hour_angle(altitude, coordinate.latitude)?;
        hours = Some(t);
        sun = solar::sun_times_at(date, t, coordinate.longitude);
    }
    hours
}

fn solve_transit(date: NaiveDate, coordinate: GeoCoordinate) -> f64 {
    let approx = solar::sun_times(date, coordinate).transit;
    solar::sun_times_at(date, approx, coordinate.longitude).transit
}

/// Compute the adaptive reference latitude for projection (Aqrab al-Bilad).
///
/// - Tropical (<30°): use 45°
/// - Temperate (30-60°): use the location's own latitude
/// - Polar (>60°): use lat - 15° (step back toward temperate zone)
pub fn compute_reference_lat(lat: f64) -> f64 {
    let abs_lat = lat.abs();
    let ref_abs = if abs_lat < 30.0 {
        45.0
    } else if abs_lat < 60.0 {
        abs_lat
    } else {
        abs_lat - 15.0
    };
    if lat >= 0.0 { ref_abs } else { -ref_abs }
}

/// Reference latitudes to try, starting at the adaptive one and stepping
/// toward 45° in the same hemisphere.
fn reference_latitudes(lat: f64) -> Vec<f64> {
    let sign = if lat >= 0.0 { 1.0 } else { -1.0 };
    let mut current = compute_reference_lat(lat).abs();
    let mut out = vec![current * sign];
    while (current - 45.0).abs() > f64::EPSILON {
        current = if current > 45.0 {
            (current - PROJECTION_STEP).max(45.0)
        } else {
            (current + PROJECTION_STEP).min(45.0)
        };
        out.push(current * sign);
    }
    out
}

/// Offset of the event from transit at a reference latitude, anchored to
/// the local transit (same longitude, so the same transit).
fn project(date: NaiveDate, coordinate: GeoCoordinate, target: Target, side: Side, event: &'static str) -> Option<f64> {
    let transit = solve_transit(date, coordinate);
    reference_latitudes(coordinate.latitude).into_iter().find_map(|reference| {
        let anchor = GeoCoordinate { latitude: reference, longitude: coordinate.longitude };
        let hours = solve_event(date, anchor, target, side)?;
        if side.sign() * (hours - transit) < MIN_PROJECTED_OFFSET {
            return None;
        }
        debug!(event, %date, reference_lat = reference, "projected from reference latitude");
        Some(hours)
    })
}

fn solve_or_project(
    date: NaiveDate,
    coordinate: GeoCoordinate,
    rule: HighLatitudeRule,
    horizon: Horizon,
    target: Target,
    side: Side,
    event: &'static str,
) -> Result<(f64, TimeSource)> {
    if horizon == Horizon::Direct {
        if let Some(hours) = solve_event(date, coordinate, target, side) {
            return Ok((hours, TimeSource::Standard));
        }
    }
    if rule != HighLatitudeRule::None {
        if let Some(hours) = project(date, coordinate, target, side, event) {
            return Ok((hours, TimeSource::Projected));
        }
    }
    Err(MiqatError::NoSolarSolution { event, date })
}

/// Twilight bounded by the safe portion of the night measured from `anchor`
/// (sunrise for Fajr, maghrib for Isha). A solved time on the wrong side of
/// a projected anchor counts as unusable.
struct Twilight {
    anchor: f64,
    side: Side,
    portion: Option<f64>,
    night: f64,
}

impl Twilight {
    fn bound(&self, solved: Option<f64>, event: &'static str, date: NaiveDate) -> Result<(f64, TimeSource)> {
        let Some(portion) = self.portion else {
            return solved
                .map(|t| (t, TimeSource::Standard))
                .ok_or(MiqatError::NoSolarSolution { event, date });
        };
        let limit = (portion * self.night).max(MIN_GAP);
        match solved {
            Some(t) if (MIN_GAP..=limit).contains(&(self.side.sign() * (t - self.anchor))) => {
                Ok((t, TimeSource::Standard))
            }
            _ => {
                debug!(event, %date, portion, night_hours = self.night, "bounded by night portion");
                Ok((self.anchor + self.side.sign() * limit, TimeSource::NightPortion))
            }
        }
    }
}

/// Solve one day. When the sun clears the horizon so briefly that Dhuhr,
/// Asr and Maghrib cannot be kept apart, the horizon and Asr events are
/// projected instead.
fn solve_day(coordinate: GeoCoordinate, date: NaiveDate, params: &CalculationParameters) -> Result<DayHours> {
    let day = solve_day_with(coordinate, date, params, Horizon::Direct)?;
    if day.sunlit_ordered() {
        return Ok(day);
    }
    if params.high_latitude_rule == HighLatitudeRule::None {
        return Err(MiqatError::NoSolarSolution { event: "asr", date });
    }
    debug!(%date, "sunlit part of the day too short, projecting");
    solve_day_with(coordinate, date, params, Horizon::Projected)
}

fn solve_day_with(
    coordinate: GeoCoordinate,
    date: NaiveDate,
    params: &CalculationParameters,
    mode: Horizon,
) -> Result<DayHours> {
    let rule = params.high_latitude_rule;
    let horizon = Target::Altitude(HORIZON_ALTITUDE);

    let (sunrise, sunrise_src) = solve_or_project(date, coordinate, rule, mode, horizon, Side::Rising, "sunrise")?;
    let (maghrib, maghrib_src) = solve_or_project(date, coordinate, rule, mode, horizon, Side::Setting, "maghrib")?;
    let dhuhr = solve_transit(date, coordinate) + minutes(params.dhuhr_offset_minutes);
    let asr_target = Target::Asr(params.asr_method.shadow_factor());
    let (asr, asr_src) = solve_or_project(date, coordinate, rule, mode, asr_target, Side::Setting, "asr")?;

    let night = 24.0 - (maghrib - sunrise);
    let adj = params.adjustments;
    // Twilight is measured from the published sunrise and maghrib
    let sunrise_at = sunrise + minutes(adj.sunrise);
    let maghrib_at = maghrib + minutes(adj.maghrib);

    let morning = Twilight {
        anchor: sunrise_at,
        side: Side::Rising,
        portion: rule.night_portion(params.fajr_angle),
        night,
    };
    let fajr_solved = solve_event(date, coordinate, Target::Altitude(-params.fajr_angle), Side::Rising);
    let (fajr, fajr_src) = morning.bound(fajr_solved, "fajr", date)?;

    let (isha, isha_src) = match params.isha {
        IshaRule::Interval(mins) => (maghrib + mins as f64 / 60.0, maghrib_src),
        IshaRule::Angle(angle) => {
            let evening = Twilight {
                anchor: maghrib_at,
                side: Side::Setting,
                portion: rule.night_portion(angle),
                night,
            };
            let solved = solve_event(date, coordinate, Target::Altitude(-angle), Side::Setting);
            evening.bound(solved, "isha", date)?
        }
    };

    Ok(DayHours {
        fajr: fajr + minutes(adj.fajr),
        sunrise: sunrise_at,
        dhuhr,
        asr: asr + minutes(adj.asr),
        maghrib: maghrib_at,
        isha: isha + minutes(adj.isha),
        sources: Sources {
            fajr: fajr_src,
            sunrise: sunrise_src,
            dhuhr: TimeSource::Standard,
            asr: asr_src,
            maghrib: maghrib_src,
            isha: isha_src,
        },
    })
}

fn minutes(m: i32) -> f64 {
    m as f64 / 60.0
}

fn to_instant(midnight: DateTime<Utc>, hours: f64, rounding: Rounding) -> DateTime<Utc> {
    let seconds = hours * 3600.0;
    let seconds = match rounding {
        Rounding::Nearest => (seconds / 60.0).round() * 60.0,
        Rounding::Up => (seconds / 60.0).ceil() * 60.0,
        Rounding::None => seconds.round(),
    };
    midnight + Duration::seconds(seconds as i64)
}

/// Compute the prayer times for `coordinate` on `date`.
pub fn calculate(coordinate: GeoCoordinate, date: NaiveDate, params: CalculationParameters) -> Result<PrayerTimeSet> {
    let day = solve_day(coordinate, date, &params)?;

    // Qiyam needs the following Fajr; an unsolvable next day falls back to today's.
    let next_fajr = match date.succ_opt().map(|next| solve_day(coordinate, next, &params)) {
        Some(Ok(next)) => next.fajr + 24.0,
        _ => day.fajr + 24.0,
    };
    // Late summer Isha can pass the start of the last third; Qiyam never precedes it.
    let qiyam = (day.maghrib + (next_fajr - day.maghrib) * 2.0 / 3.0).max(day.isha);

    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let at = |hours: f64| to_instant(midnight, hours, params.rounding);

    Ok(PrayerTimeSet {
        date,
        coordinate,
        params,
        fajr: at(day.fajr),
        sunrise: at(day.sunrise),
        dhuhr: at(day.dhuhr),
        asr: at(day.asr),
        maghrib: at(day.maghrib),
        isha: at(day.isha),
        qiyam: at(qiyam),
        sources: day.sources,
    })
}

/// Validate the coordinate, resolve `method_name` leniently and compute.
pub fn calculate_prayer_times(latitude: f64, longitude: f64, date: NaiveDate, method_name: &str) -> Result<PrayerTimeSet> {
    let coordinate = GeoCoordinate::new(latitude, longitude)?;
    calculate(coordinate, date, method::resolve_method(method_name))
}
