//! Current/next prayer navigation over a computed day.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::geo::GeoCoordinate;
use crate::schedule::{self, PrayerTimeSet};

/// Days searched past the computed date before settling for an estimate.
const MAX_DAY_SEARCH: usize = 4;

/// The five daily prayers. Sunrise and Qiyam are not prayers here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ALL: [Prayer; 5] = [Prayer::Fajr, Prayer::Dhuhr, Prayer::Asr, Prayer::Maghrib, Prayer::Isha];

    pub fn name(self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }

    pub fn time_in(self, times: &PrayerTimeSet) -> DateTime<Utc> {
        match self {
            Prayer::Fajr => times.fajr,
            Prayer::Dhuhr => times.dhuhr,
            Prayer::Asr => times.asr,
            Prayer::Maghrib => times.maghrib,
            Prayer::Isha => times.isha,
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerEntry {
    pub prayer: Prayer,
    pub time: DateTime<Utc>,
    pub is_next_day: bool,
}

impl PrayerEntry {
    fn today(prayer: Prayer, times: &PrayerTimeSet) -> Self {
        Self { prayer, time: prayer.time_in(times), is_next_day: false }
    }
}

/// The first prayer strictly after `now`.
///
/// When every prayer of `times` has passed, the following day's Fajr is
/// returned with `is_next_day` set. With a coordinate it is computed using
/// the same parameters; without one it is estimated as today's Fajr plus
/// whole days.
pub fn next_prayer(times: &PrayerTimeSet, now: DateTime<Utc>, coordinate: Option<GeoCoordinate>) -> PrayerEntry {
    if let Some(entry) = Prayer::ALL
        .iter()
        .map(|p| PrayerEntry::today(*p, times))
        .find(|e| e.time > now)
    {
        return entry;
    }

    let computed = coordinate.and_then(|coordinate| next_day_fajr(times, coordinate, now));
    let time = computed.unwrap_or_else(|| estimate_fajr(times.fajr, now));
    PrayerEntry { prayer: Prayer::Fajr, time, is_next_day: true }
}

fn next_day_fajr(times: &PrayerTimeSet, coordinate: GeoCoordinate, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    // Skip straight to the day before `now` when the set is stale.
    let mut date = times.date.succ_opt()?.max(now.date_naive().pred_opt()?);
    for _ in 0..MAX_DAY_SEARCH {
        match schedule::calculate(coordinate, date, times.params) {
            Ok(next) if next.fajr > now => return Some(next.fajr),
            Ok(_) => {}
            Err(e) => {
                debug!(%date, error = %e, "next-day Fajr unavailable, estimating");
                return None;
            }
        }
        date = date.succ_opt()?;
    }
    None
}

fn estimate_fajr(fajr: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let elapsed_days = (now - fajr).num_days().max(0);
    fajr + Duration::days(elapsed_days + 1)
}

/// The latest prayer whose time is at or before `now`; `None` before Fajr.
pub fn current_prayer(times: &PrayerTimeSet, now: DateTime<Utc>) -> Option<PrayerEntry> {
    Prayer::ALL
        .iter()
        .rev()
        .map(|p| PrayerEntry::today(*p, times))
        .find(|e| e.time <= now)
}

/// Whole hours and minutes until a target instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRemaining {
    pub hours: i64,
    pub minutes: i64,
}

impl TimeRemaining {
    pub fn total_minutes(&self) -> i64 {
        self.hours * 60 + self.minutes
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hours > 0 {
            write!(f, "{}h {}m", self.hours, self.minutes)
        } else {
            write!(f, "{}m", self.minutes)
        }
    }
}

/// Floored time until `target`; zero when `target` has passed.
pub fn time_remaining(target: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    let total = (target - now).num_minutes().max(0);
    TimeRemaining { hours: total / 60, minutes: total % 60 }
}
