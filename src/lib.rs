//! miqat: Islamic prayer times from explicit solar arithmetic, with
//! high-latitude fallbacks, current/next navigation, a tabular Hijri
//! calendar, holidays and reminder planning.
//!
//! ```no_run
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//! let times = miqat::calculate_prayer_times(21.4225, 39.8262, date, "MuslimWorldLeague")?;
//! println!("Fajr {} Isha {}", times.fajr, times.isha);
//! # Ok::<(), miqat::MiqatError>(())
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod hijri;
pub mod holidays;
pub mod location;
pub mod method;
pub mod navigator;
pub mod notify;
pub mod schedule;
pub mod server;
pub mod solar;
pub mod solver;
pub mod store;

pub use error::{MiqatError, Result};
pub use geo::GeoCoordinate;
pub use hijri::{days_until_ramadan, is_ramadan, to_gregorian, to_hijri, HijriDate};
pub use holidays::{upcoming_holidays, Holiday, UpcomingHoliday};
pub use method::{resolve_method, AsrMethod, CalculationMethod, CalculationParameters, HighLatitudeRule};
pub use navigator::{current_prayer, next_prayer, time_remaining, Prayer, PrayerEntry, TimeRemaining};
pub use schedule::{calculate, calculate_prayer_times, PrayerTimeSet, TimeSource};
