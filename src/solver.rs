//! Local-time view of a computed day: wall-clock times in the location's
//! timezone, current/next prayer and the ASCII timeline.

use chrono::{DateTime, NaiveDate, Offset, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::Result;
use crate::geo::GeoCoordinate;
use crate::hijri::{self, HijriDate};
use crate::location::ResolvedLocation;
use crate::method::CalculationParameters;
use crate::navigator::{self, Prayer, PrayerEntry, TimeRemaining};
use crate::schedule::{self, PrayerTimeSet, Sources, TimeSource};
use crate::solar;

#[derive(Debug, Clone, Serialize)]
pub struct LocationInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    /// e.g. "+03:00"
    pub utc_offset: String,
}

/// One event on the local clock.
#[derive(Debug, Clone, Serialize)]
pub struct LocalEvent {
    /// Lowercase event key ("fajr" .. "qiyam").
    pub name: &'static str,
    /// Local "HH:MM".
    pub time: String,
    pub source: TimeSource,
    /// Local days after the requested date (-1, 0 or +1).
    pub day_offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrayerStatus {
    pub prayer: Prayer,
    pub time: String,
    pub at: DateTime<Utc>,
    pub is_next_day: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolverOutput {
    pub location: LocationInfo,
    pub date: NaiveDate,
    pub method: String,
    pub hijri: Option<HijriDate>,
    pub times: Vec<LocalEvent>,
    pub sources: Sources,
    pub current: Option<PrayerStatus>,
    pub next: PrayerStatus,
    pub remaining: TimeRemaining,
    /// Sun position at the moment of the request.
    pub sun: SunNow,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SunNow {
    pub altitude: f64,
    pub azimuth: f64,
}

impl SolverOutput {
    pub fn event(&self, name: &str) -> Option<&LocalEvent> {
        self.times.iter().find(|e| e.name == name)
    }
}

pub struct Solver {
    pub coordinate: GeoCoordinate,
    pub tz: Tz,
    pub params: CalculationParameters,
    name: Option<String>,
}

impl Solver {
    pub fn new(coordinate: GeoCoordinate, tz: Tz, params: CalculationParameters) -> Self {
        Self { coordinate, tz, params, name: None }
    }

    pub fn from_resolved(resolved: &ResolvedLocation, params: CalculationParameters) -> Result<Self> {
        Ok(Self {
            coordinate: resolved.coordinate()?,
            tz: resolved.timezone(),
            params,
            name: Some(resolved.display_name()),
        })
    }

    /// The UTC prayer times for a local date.
    pub fn prayer_times(&self, date: NaiveDate) -> Result<PrayerTimeSet> {
        schedule::calculate(self.coordinate, date, self.params)
    }

    /// Compute `date` and describe it relative to `now`.
    pub fn solve(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<SolverOutput> {
        let times = self.prayer_times(date)?;
        Ok(self.describe(&times, now))
    }

    /// Local view of an already computed set.
    pub fn describe(&self, times: &PrayerTimeSet, now: DateTime<Utc>) -> SolverOutput {
        let date = times.date;
        let source_of = |name: &str| {
            times
                .sources
                .all()
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, s)| *s)
                .unwrap_or_default()
        };
        let events = times
            .events()
            .into_iter()
            .map(|(name, at)| {
                let local = at.with_timezone(&self.tz);
                LocalEvent {
                    name,
                    time: local.format("%H:%M").to_string(),
                    source: source_of(name),
                    day_offset: (local.date_naive() - date).num_days(),
                }
            })
            .collect();

        let next = navigator::next_prayer(times, now, Some(self.coordinate));
        let current = navigator::current_prayer(times, now);

        SolverOutput {
            location: LocationInfo {
                name: self.name.clone(),
                latitude: self.coordinate.latitude,
                longitude: self.coordinate.longitude,
                timezone: self.tz.name().to_string(),
                utc_offset: self.utc_offset(date),
            },
            date,
            method: times.method().name().to_string(),
            hijri: hijri::to_hijri(date).ok(),
            times: events,
            sources: times.sources,
            current: current.map(|e| self.status(e)),
            remaining: navigator::time_remaining(next.time, now),
            next: self.status(next),
            sun: self.sun_at(now),
        }
    }

    fn status(&self, entry: PrayerEntry) -> PrayerStatus {
        PrayerStatus {
            prayer: entry.prayer,
            time: entry.time.with_timezone(&self.tz).format("%H:%M").to_string(),
            at: entry.time,
            is_next_day: entry.is_next_day,
        }
    }

    fn sun_at(&self, now: DateTime<Utc>) -> SunNow {
        let position = solar::solar_position(&now.naive_utc(), self.coordinate.latitude, self.coordinate.longitude);
        SunNow {
            altitude: (position.altitude * 100.0).round() / 100.0,
            azimuth: (position.azimuth * 100.0).round() / 100.0,
        }
    }

    /// Offset at local noon, so DST days report the daytime offset.
    fn utc_offset(&self, date: NaiveDate) -> String {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        let seconds = noon.and_utc().with_timezone(&self.tz).offset().fix().local_minus_utc();
        let sign = if seconds < 0 { '-' } else { '+' };
        let seconds = seconds.abs();
        format!("{}{:02}:{:02}", sign, seconds / 3600, (seconds % 3600) / 60)
    }
}

const BAR_WIDTH: usize = 60;

/// Render a 24-hour timeline plus the event list.
pub fn render_ascii_timeline(output: &SolverOutput) -> String {
    let mut out = String::new();

    let hijri = output.hijri.map(|h| format!(" ({})", h)).unwrap_or_default();
    out.push_str(&format!("  {}{} \u{00B7} {}\n", output.date, hijri, output.method));
    out.push_str(&format!("  \u{2554}{}\u{2557}\n", "\u{2550}".repeat(BAR_WIDTH + 2)));

    // Only events on the requested local day get a marker
    let mut bar = vec!['\u{2500}'; BAR_WIDTH];
    let mut labels = vec![' '; BAR_WIDTH];
    for event in output.times.iter().filter(|e| e.day_offset == 0) {
        let minutes = minutes_of(&event.time);
        let pos = (minutes * BAR_WIDTH / 1440).min(BAR_WIDTH - 1);
        bar[pos] = '\u{2502}';
        labels[pos] = event.name.chars().next().map_or('?', |c| c.to_ascii_uppercase());
    }
    out.push_str(&format!("  \u{2551} {} \u{2551}\n", bar.iter().collect::<String>()));
    out.push_str(&format!("  \u{2551} {} \u{2551}\n", labels.iter().collect::<String>()));
    out.push_str(&format!("  \u{2560}{}\u{2563}\n", "\u{2550}".repeat(BAR_WIDTH + 2)));

    for event in &output.times {
        let tag = match event.source {
            TimeSource::Standard => "",
            TimeSource::NightPortion => " [N]",
            TimeSource::Projected => " [P]",
        };
        let day = match event.day_offset {
            0 => "",
            d if d > 0 => " (+1d)",
            _ => " (-1d)",
        };
        let marker = if event.name.eq_ignore_ascii_case(output.next.prayer.name()) && output.next.time == event.time {
            "  \u{25C0} next"
        } else {
            ""
        };
        let line = format!("  {:<8} {}{}{}{}", label(event.name), event.time, tag, day, marker);
        out.push_str(&format!("  \u{2551}{:<width$}\u{2551}\n", line, width = BAR_WIDTH + 2));
    }

    out.push_str(&format!("  \u{255A}{}\u{255D}\n", "\u{2550}".repeat(BAR_WIDTH + 2)));
    out.push_str("    00:00          06:00          12:00          18:00       23:59\n");
    out.push_str(&format!(
        "  Next: {} at {} (in {})\n",
        output.next.prayer, output.next.time, output.remaining
    ));
    out
}

fn label(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn minutes_of(hhmm: &str) -> usize {
    let mut parts = hhmm.split(':').map(|p| p.parse::<usize>().unwrap_or(0));
    let h = parts.next().unwrap_or(0);
    let m = parts.next().unwrap_or(0);
    (h * 60 + m).min(1439)
}

/// Local wall-clock "HH:MM" for an instant.
pub fn local_hhmm(at: DateTime<Utc>, tz: Tz) -> String {
    let local = at.with_timezone(&tz);
    format!("{:02}:{:02}", local.hour(), local.minute())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::CalculationMethod;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn solver(lat: f64, lon: f64, tz: Tz) -> Solver {
        Solver::new(GeoCoordinate::new(lat, lon).unwrap(), tz, CalculationMethod::MuslimWorldLeague.parameters())
    }

    #[test]
    fn test_mecca_local_times() {
        let s = solver(21.4225, 39.8262, chrono_tz::Asia::Riyadh);
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap();
        let out = s.solve(ymd(2024, 3, 15), now).unwrap();
        println!("{}", serde_json::to_string_pretty(&out).unwrap());

        assert_eq!(out.location.utc_offset, "+03:00");
        assert_eq!(out.method, "MuslimWorldLeague");
        assert!(out.event("fajr").unwrap().time.starts_with("05:"));
        assert!(out.event("dhuhr").unwrap().time.starts_with("12:"));
        assert!(out.times.iter().all(|e| e.source == TimeSource::Standard));
        for e in &out.times {
            let expected = if e.name == "qiyam" { 1 } else { 0 };
            assert_eq!(e.day_offset, expected, "{} at {}", e.name, e.time);
        }
        assert!(out.event("qiyam").unwrap().time.starts_with("01:"));
        assert_eq!(out.hijri.unwrap().month, 9);

        // 11:00 local: Fajr has passed, Dhuhr is next
        assert_eq!(out.current.as_ref().unwrap().prayer, Prayer::Fajr);
        assert_eq!(out.next.prayer, Prayer::Dhuhr);
        assert!(out.remaining.total_minutes() > 60 && out.remaining.total_minutes() < 120);
        // Late morning in Mecca: sun high in the eastern half of the sky
        assert!(out.sun.altitude > 50.0, "{:?}", out.sun);
        assert!(out.sun.azimuth > 90.0 && out.sun.azimuth < 180.0, "{:?}", out.sun);
    }

    #[test]
    fn test_next_day_wrapping_in_local_time() {
        let s = solver(69.6492, 18.9553, chrono_tz::Europe::Oslo);
        let date = ymd(2026, 6, 21);
        let out = s.solve(date, Utc.with_ymd_and_hms(2026, 6, 21, 12, 0, 0).unwrap()).unwrap();
        let isha = out.event("isha").unwrap();
        println!("Tromsø isha {} offset {}", isha.time, isha.day_offset);
        assert_eq!(isha.day_offset, 1);
        assert_eq!(isha.source, TimeSource::NightPortion);
        assert_eq!(out.event("fajr").unwrap().day_offset, 0);
        assert_eq!(out.event("sunrise").unwrap().source, TimeSource::Projected);
    }

    #[test]
    fn test_ascii_timeline() {
        let s = solver(21.4225, 39.8262, chrono_tz::Asia::Riyadh);
        let out = s.solve(ymd(2024, 3, 15), Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap()).unwrap();
        let ascii = render_ascii_timeline(&out);
        println!("{}", ascii);
        for name in ["Fajr", "Sunrise", "Dhuhr", "Asr", "Maghrib", "Isha", "Qiyam"] {
            assert!(ascii.contains(name), "{} missing", name);
        }
        assert!(ascii.contains("Ramadan"));
        assert!(ascii.contains("\u{25C0} next"));
        assert!(!ascii.contains("[P]"));
    }

    #[test]
    fn test_ascii_timeline_shows_fallback_tags() {
        let s = solver(69.6492, 18.9553, chrono_tz::Europe::Oslo);
        let out = s.solve(ymd(2026, 6, 21), Utc.with_ymd_and_hms(2026, 6, 21, 12, 0, 0).unwrap()).unwrap();
        let ascii = render_ascii_timeline(&out);
        println!("{}", ascii);
        assert!(ascii.contains("[P]"));
        assert!(ascii.contains("[N]"));
        assert!(ascii.contains("(+1d)"));
    }

    #[test]
    fn test_rows_are_aligned() {
        let s = solver(51.5074, -0.1278, chrono_tz::Europe::London);
        let out = s.solve(ymd(2024, 6, 21), Utc.with_ymd_and_hms(2024, 6, 21, 10, 0, 0).unwrap()).unwrap();
        let ascii = render_ascii_timeline(&out);
        let widths: Vec<usize> = ascii
            .lines()
            .filter(|l| l.trim_start().starts_with('\u{2551}'))
            .map(|l| l.chars().count())
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{:?}", widths);
    }

    #[test]
    fn test_from_resolved() {
        let loc = crate::location::builtin_lookup("cairo").unwrap();
        let s = Solver::from_resolved(&loc, CalculationMethod::Egyptian.parameters()).unwrap();
        assert_eq!(s.tz, chrono_tz::Africa::Cairo);
        let out = s.solve(ymd(2024, 1, 10), Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap()).unwrap();
        assert_eq!(out.location.name.as_deref(), Some("Cairo, EG"));
        assert_eq!(out.location.utc_offset, "+02:00");
    }

    #[test]
    fn test_local_hhmm() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
        assert_eq!(local_hhmm(at, chrono_tz::Asia::Tokyo), "08:30");
        assert_eq!(local_hhmm(at, chrono_tz::America::New_York), "18:30");
    }
}
