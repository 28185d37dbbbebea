//! Fixed Islamic holidays and their upcoming Gregorian dates.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::hijri::{self, HijriDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Holiday {
    pub name: &'static str,
    pub hijri_month: u32,
    pub hijri_day: u32,
    pub description: &'static str,
}

pub const HOLIDAYS: [Holiday; 9] = [
    Holiday { name: "Islamic New Year", hijri_month: 1, hijri_day: 1, description: "Beginning of the Islamic calendar year" },
    Holiday { name: "Day of Ashura", hijri_month: 1, hijri_day: 10, description: "Day of remembrance in Islam" },
    Holiday { name: "Mawlid an-Nabi", hijri_month: 3, hijri_day: 12, description: "Birth of Prophet Muhammad (PBUH)" },
    Holiday { name: "Laylat al-Mi'raj", hijri_month: 7, hijri_day: 27, description: "Night Journey of Prophet Muhammad (PBUH)" },
    Holiday { name: "Laylat al-Bara'at", hijri_month: 8, hijri_day: 15, description: "Night of Forgiveness" },
    Holiday { name: "Start of Ramadan", hijri_month: 9, hijri_day: 1, description: "Beginning of the holy month of fasting" },
    Holiday { name: "Laylat al-Qadr", hijri_month: 9, hijri_day: 27, description: "Night of Power (approximate date)" },
    Holiday { name: "Eid al-Fitr", hijri_month: 10, hijri_day: 1, description: "Festival of Breaking the Fast" },
    Holiday { name: "Eid al-Adha", hijri_month: 12, hijri_day: 10, description: "Festival of Sacrifice" },
];

/// A holiday occurrence in a specific Hijri year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingHoliday {
    #[serde(flatten)]
    pub holiday: Holiday,
    pub hijri_year: u32,
    pub date: NaiveDate,
    pub days_until: i64,
}

/// The next `limit` holidays on or after `date`, soonest first.
///
/// Candidates come from the current and the next Hijri year, which
/// always covers at least nine occurrences.
pub fn upcoming_holidays(date: NaiveDate, limit: usize) -> Result<Vec<UpcomingHoliday>> {
    let year = hijri::to_hijri(date)?.year;

    let mut upcoming = Vec::with_capacity(HOLIDAYS.len() * 2);
    for hijri_year in [year, year + 1] {
        for holiday in HOLIDAYS {
            let day = HijriDate { year: hijri_year, month: holiday.hijri_month, day: holiday.hijri_day };
            let gregorian = hijri::to_gregorian(day)?;
            if gregorian >= date {
                upcoming.push(UpcomingHoliday {
                    holiday,
                    hijri_year,
                    date: gregorian,
                    days_until: (gregorian - date).num_days(),
                });
            }
        }
    }

    upcoming.sort_by_key(|h| h.date);
    upcoming.truncate(limit);
    Ok(upcoming)
}
