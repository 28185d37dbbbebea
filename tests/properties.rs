use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use miqat::hijri::RAMADAN;
use miqat::method::{CalculationMethod, HighLatitudeRule};
use miqat::{
    calculate, current_prayer, days_until_ramadan, is_ramadan, next_prayer, to_gregorian, to_hijri, upcoming_holidays,
    GeoCoordinate, Prayer, PrayerTimeSet, TimeSource,
};

fn date_from(base: (i32, u32, u32), days: i64) -> NaiveDate {
    let base = NaiveDate::from_ymd_opt(base.0, base.1, base.2).unwrap();
    base.checked_add_signed(Duration::days(days)).unwrap()
}

fn any_method() -> impl Strategy<Value = CalculationMethod> {
    (0..CalculationMethod::ALL.len()).prop_map(|i| CalculationMethod::ALL[i])
}

fn any_rule() -> impl Strategy<Value = HighLatitudeRule> {
    prop_oneof![
        Just(HighLatitudeRule::MiddleOfTheNight),
        Just(HighLatitudeRule::SeventhOfTheNight),
        Just(HighLatitudeRule::TwilightAngle),
    ]
}

fn fully_ordered(t: &PrayerTimeSet) -> bool {
    t.fajr < t.sunrise
        && t.sunrise < t.dhuhr
        && t.dhuhr < t.asr
        && t.asr < t.maghrib
        && t.maghrib < t.isha
        && t.isha <= t.qiyam
}

proptest! {
    /// Invariant: away from the polar circles every event is solved
    /// directly and the day is strictly ordered.
    #[test]
    fn mid_latitude_days_are_ordered(
        lat in -45.0f64..45.0,
        lon in -180.0f64..180.0,
        days in 0i64..36500,
        method in any_method(),
    ) {
        let date = date_from((2000, 1, 1), days);
        let t = calculate(GeoCoordinate::new(lat, lon).unwrap(), date, method.parameters()).unwrap();
        prop_assert!(t.fajr < t.sunrise, "{:?}", t);
        prop_assert!(t.sunrise < t.dhuhr, "{:?}", t);
        prop_assert!(t.dhuhr < t.asr, "{:?}", t);
        prop_assert!(t.asr < t.maghrib, "{:?}", t);
        prop_assert!(t.maghrib < t.isha, "{:?}", t);
        prop_assert!(t.isha <= t.qiyam, "{:?}", t);
        prop_assert_eq!(t.sources.sunrise, TimeSource::Standard);
        prop_assert_eq!(t.sources.maghrib, TimeSource::Standard);
    }

    /// Invariant: between 45° and the polar circles, under every rule, a
    /// day that needed no fallback is fully ordered, and the sunlit part is
    /// ordered either way.
    #[test]
    fn temperate_days_are_ordered_unless_adjusted(
        lat in 45.0f64..66.0,
        south in any::<bool>(),
        lon in -180.0f64..180.0,
        days in 0i64..3650,
        method in any_method(),
        rule in any_rule(),
    ) {
        let lat = if south { -lat } else { lat };
        let date = date_from((2020, 1, 1), days);
        let params = method.parameters().with_high_latitude_rule(rule);
        let t = calculate(GeoCoordinate::new(lat, lon).unwrap(), date, params).unwrap();
        prop_assert!(t.sunrise < t.dhuhr && t.dhuhr < t.asr && t.asr < t.maghrib, "{:?}", t);
        prop_assert!(t.fajr < t.sunrise && t.maghrib < t.isha && t.isha <= t.qiyam, "{:?}", t);
        if !t.is_adjusted() {
            prop_assert!(fully_ordered(&t), "{:?}", t);
        }
    }

    /// Invariant: with a high-latitude rule every day resolves, and the
    /// sunlit part of the day stays ordered.
    #[test]
    fn high_latitude_days_always_resolve(
        lat in 48.0f64..89.9,
        south in any::<bool>(),
        lon in -180.0f64..180.0,
        days in 0i64..3650,
        method in any_method(),
        rule in any_rule(),
    ) {
        let lat = if south { -lat } else { lat };
        let date = date_from((2020, 1, 1), days);
        let params = method.parameters().with_high_latitude_rule(rule);
        let t = calculate(GeoCoordinate::new(lat, lon).unwrap(), date, params).unwrap();
        prop_assert!(t.sunrise < t.dhuhr && t.dhuhr < t.maghrib, "{:?}", t);
        prop_assert!(t.fajr < t.sunrise && t.maghrib < t.isha && t.isha <= t.qiyam, "{:?}", t);
        if !t.is_adjusted() {
            prop_assert!(fully_ordered(&t), "{:?}", t);
        }
    }

    /// Invariant: `current` and `next` partition the day, and `next` is
    /// always in the future.
    #[test]
    fn navigator_partitions_the_day(minutes in -360i64..(30 * 60), with_coordinate in any::<bool>()) {
        let coordinate = GeoCoordinate::new(21.4225, 39.8262).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let times = calculate(coordinate, date, CalculationMethod::MuslimWorldLeague.parameters()).unwrap();
        let now = times.fajr + Duration::minutes(minutes);

        let next = next_prayer(&times, now, with_coordinate.then_some(coordinate));
        prop_assert!(next.time > now);

        match current_prayer(&times, now) {
            None => {
                prop_assert!(now < times.fajr);
                prop_assert_eq!(next.prayer, Prayer::Fajr);
                prop_assert!(!next.is_next_day);
            }
            Some(current) => {
                prop_assert!(current.time <= now);
                if current.prayer == Prayer::Isha {
                    prop_assert!(next.is_next_day);
                    prop_assert_eq!(next.prayer, Prayer::Fajr);
                } else {
                    let i = Prayer::ALL.iter().position(|p| *p == current.prayer).unwrap();
                    prop_assert_eq!(next.prayer, Prayer::ALL[i + 1]);
                }
            }
        }
    }

    /// Invariant: Gregorian → Hijri → Gregorian is the identity.
    #[test]
    fn hijri_round_trip(days in 0i64..400_000) {
        let date = date_from((622, 7, 19), days);
        let h = to_hijri(date).unwrap();
        prop_assert!((1..=12).contains(&h.month) && (1..=30).contains(&h.day));
        prop_assert_eq!(to_gregorian(h).unwrap(), date);
    }

    /// Invariant: `is_ramadan` agrees with the converted month, and the
    /// countdown only reaches zero inside Ramadan.
    #[test]
    fn ramadan_consistency(days in 0i64..73000) {
        let date = date_from((1900, 1, 1), days);
        let in_ramadan = to_hijri(date).unwrap().month == RAMADAN;
        prop_assert_eq!(is_ramadan(date), in_ramadan);
        prop_assert_eq!(days_until_ramadan(date).unwrap() == 0, in_ramadan);
    }

    /// Invariant: outside Ramadan the countdown drops by one per day.
    #[test]
    fn ramadan_countdown_is_monotone(days in 0i64..73000) {
        let date = date_from((1900, 1, 1), days);
        let today = days_until_ramadan(date).unwrap();
        let tomorrow = days_until_ramadan(date.succ_opt().unwrap()).unwrap();
        if today > 0 {
            prop_assert_eq!(tomorrow, today - 1);
        }
        prop_assert!(today <= 355);
    }

    /// Invariant: the next three holidays are sorted and on/after the date.
    #[test]
    fn holidays_sorted(days in 0i64..73000) {
        let date = date_from((1900, 1, 1), days);
        let list = upcoming_holidays(date, 3).unwrap();
        prop_assert_eq!(list.len(), 3);
        prop_assert!(list.windows(2).all(|w| w[0].date <= w[1].date));
        prop_assert!(list.iter().all(|h| h.date >= date && h.days_until >= 0));
    }
}
