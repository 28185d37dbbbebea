//! Tabular Hijri calendar (civil, 30-year cycle).
//!
//! Conversion runs through the Julian Day Number. Dates are arithmetic, not
//! moon-sighting based, so they can differ from an announced calendar by a
//! day or two.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MiqatError, Result};

/// JDN of 1 Muharram 1 AH (July 19, 622 CE, proleptic Gregorian).
const HIJRI_EPOCH_JDN: i64 = 1_948_440;

/// Offset between chrono's day count from 0001-01-01 CE and the JDN.
const CE_TO_JDN: i64 = 1_721_425;

/// 30 years = 19 × 354 + 11 × 355 days.
const CYCLE_DAYS: i64 = 10_631;

/// The 30-year cycle pattern: which years in a 30-year cycle are leap years.
/// Leap years have 355 days, common years have 354 days.
const LEAP_YEARS: [u32; 11] = [2, 5, 7, 10, 13, 16, 18, 21, 24, 26, 29];

pub const RAMADAN: u32 = 9;

const MONTH_NAMES: [&str; 12] = [
    "Muharram",
    "Safar",
    "Rabi' al-awwal",
    "Rabi' al-thani",
    "Jumada al-awwal",
    "Jumada al-thani",
    "Rajab",
    "Sha'ban",
    "Ramadan",
    "Shawwal",
    "Dhu al-Qi'dah",
    "Dhu al-Hijjah",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HijriDate {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl HijriDate {
    /// Validated constructor: year ≥ 1, month 1..=12, day within the month.
    pub fn new(year: u32, month: u32, day: u32) -> Result<Self> {
        if year == 0 {
            return Err(MiqatError::hijri("year must be 1 or later"));
        }
        if !(1..=12).contains(&month) {
            return Err(MiqatError::hijri(format!("month {} out of range 1..=12", month)));
        }
        let length = days_in_month(year, month);
        if day == 0 || day > length {
            return Err(MiqatError::hijri(format!(
                "day {} out of range for {} {} ({} days)",
                day,
                MONTH_NAMES[month as usize - 1],
                year,
                length
            )));
        }
        Ok(Self { year, month, day })
    }

    pub fn month_name(&self) -> &'static str {
        month_name(self.month).unwrap_or("Unknown")
    }
}

impl fmt::Display for HijriDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} AH", self.day, self.month_name(), self.year)
    }
}

/// English transliteration of a Hijri month, 1-based.
pub fn month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES.get((month as usize).checked_sub(1)?).copied()
}

pub fn is_leap_year(year: u32) -> bool {
    LEAP_YEARS.contains(&(year % 30))
}

fn year_days(year: u32) -> i64 {
    if is_leap_year(year) { 355 } else { 354 }
}

/// Odd months have 30 days, even months 29; Dhu al-Hijjah has 30 in leap years.
pub fn days_in_month(year: u32, month: u32) -> u32 {
    if month % 2 == 1 || (month == 12 && is_leap_year(year)) {
        30
    } else {
        29
    }
}

fn jdn(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 + CE_TO_JDN
}

fn from_jdn(jdn: i64) -> Option<NaiveDate> {
    i32::try_from(jdn - CE_TO_JDN)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Days from the epoch to 1 Muharram of `year`.
fn days_before_year(year: u32) -> i64 {
    let elapsed = year as i64 - 1;
    let cycles = elapsed / 30;
    let first = cycles as u32 * 30 + 1;
    let partial: i64 = (first..year).map(year_days).sum();
    cycles * CYCLE_DAYS + partial
}

/// Convert a Gregorian date to the tabular Hijri calendar.
pub fn to_hijri(date: NaiveDate) -> Result<HijriDate> {
    let days_since_epoch = jdn(date) - HIJRI_EPOCH_JDN;
    if days_since_epoch < 0 {
        return Err(MiqatError::hijri(format!("{} is before the Hijri epoch", date)));
    }

    let cycles = days_since_epoch / CYCLE_DAYS;
    let mut remaining = days_since_epoch % CYCLE_DAYS;
    let mut year = (cycles * 30) as u32 + 1;
    while remaining >= year_days(year) {
        remaining -= year_days(year);
        year += 1;
    }

    let mut month = 1;
    while remaining >= days_in_month(year, month) as i64 {
        remaining -= days_in_month(year, month) as i64;
        month += 1;
    }

    Ok(HijriDate { year, month, day: remaining as u32 + 1 })
}

/// Convert a Hijri date back to Gregorian. Rejects invalid fields and
/// dates beyond chrono's range.
pub fn to_gregorian(hijri: HijriDate) -> Result<NaiveDate> {
    let HijriDate { year, month, day } = HijriDate::new(hijri.year, hijri.month, hijri.day)?;
    let months: i64 = (1..month).map(|m| days_in_month(year, m) as i64).sum();
    let days = days_before_year(year) + months + day as i64 - 1;
    from_jdn(HIJRI_EPOCH_JDN + days).ok_or_else(|| MiqatError::hijri(format!("{} is out of range", hijri)))
}

/// True when `date` falls in Ramadan. Unconvertible dates are not Ramadan.
pub fn is_ramadan(date: NaiveDate) -> bool {
    to_hijri(date).map(|h| h.month == RAMADAN).unwrap_or(false)
}

/// Days until 1 Ramadan; zero while Ramadan is under way.
pub fn days_until_ramadan(date: NaiveDate) -> Result<u32> {
    let today = to_hijri(date)?;
    if today.month == RAMADAN {
        return Ok(0);
    }
    let year = if today.month < RAMADAN { today.year } else { today.year + 1 };
    let start = to_gregorian(HijriDate { year, month: RAMADAN, day: 1 })?;
    Ok((start - date).num_days() as u32)
}
