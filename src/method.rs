//! Calculation method registry.
//!
//! Each named convention maps to a fixed set of twilight angles, minute
//! adjustments, and defaults for the Asr shadow factor and the
//! high-latitude rule. The table is static; callers receive copies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MiqatError;

/// Named calculation conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationMethod {
    MuslimWorldLeague,
    Egyptian,
    Karachi,
    UmmAlQura,
    Dubai,
    Qatar,
    Kuwait,
    Singapore,
    Turkey,
    NorthAmerica,
    MoonsightingCommittee,
}

impl CalculationMethod {
    pub const ALL: [CalculationMethod; 11] = [
        Self::MuslimWorldLeague,
        Self::Egyptian,
        Self::Karachi,
        Self::UmmAlQura,
        Self::Dubai,
        Self::Qatar,
        Self::Kuwait,
        Self::Singapore,
        Self::Turkey,
        Self::NorthAmerica,
        Self::MoonsightingCommittee,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MuslimWorldLeague => "MuslimWorldLeague",
            Self::Egyptian => "Egyptian",
            Self::Karachi => "Karachi",
            Self::UmmAlQura => "UmmAlQura",
            Self::Dubai => "Dubai",
            Self::Qatar => "Qatar",
            Self::Kuwait => "Kuwait",
            Self::Singapore => "Singapore",
            Self::Turkey => "Turkey",
            Self::NorthAmerica => "NorthAmerica",
            Self::MoonsightingCommittee => "MoonsightingCommittee",
        }
    }

    /// The registry entry for this method.
    pub fn parameters(self) -> CalculationParameters {
        let base = CalculationParameters {
            method: self,
            fajr_angle: 18.0,
            isha: IshaRule::Angle(17.0),
            asr_method: AsrMethod::Standard,
            high_latitude_rule: HighLatitudeRule::MiddleOfTheNight,
            dhuhr_offset_minutes: 0,
            adjustments: Adjustments::default(),
            rounding: Rounding::Nearest,
        };
        match self {
            Self::MuslimWorldLeague => CalculationParameters { dhuhr_offset_minutes: 1, ..base },
            Self::Egyptian => CalculationParameters {
                fajr_angle: 19.5,
                isha: IshaRule::Angle(17.5),
                dhuhr_offset_minutes: 1,
                ..base
            },
            Self::Karachi => CalculationParameters {
                isha: IshaRule::Angle(18.0),
                dhuhr_offset_minutes: 1,
                ..base
            },
            Self::UmmAlQura => CalculationParameters {
                fajr_angle: 18.5,
                isha: IshaRule::Interval(90),
                ..base
            },
            Self::Dubai => CalculationParameters {
                fajr_angle: 18.2,
                isha: IshaRule::Angle(18.2),
                dhuhr_offset_minutes: 3,
                adjustments: Adjustments { sunrise: -3, asr: 3, maghrib: 3, ..Adjustments::default() },
                ..base
            },
            Self::Qatar => CalculationParameters { isha: IshaRule::Interval(90), ..base },
            Self::Kuwait => CalculationParameters { isha: IshaRule::Angle(17.5), ..base },
            Self::Singapore => CalculationParameters {
                fajr_angle: 20.0,
                isha: IshaRule::Angle(18.0),
                dhuhr_offset_minutes: 1,
                rounding: Rounding::Up,
                ..base
            },
            Self::Turkey => CalculationParameters {
                dhuhr_offset_minutes: 5,
                adjustments: Adjustments { sunrise: -7, asr: 4, maghrib: 7, ..Adjustments::default() },
                ..base
            },
            Self::NorthAmerica => CalculationParameters {
                fajr_angle: 15.0,
                isha: IshaRule::Angle(15.0),
                dhuhr_offset_minutes: 1,
                ..base
            },
            Self::MoonsightingCommittee => CalculationParameters {
                isha: IshaRule::Angle(18.0),
                dhuhr_offset_minutes: 5,
                adjustments: Adjustments { maghrib: 3, ..Adjustments::default() },
                high_latitude_rule: HighLatitudeRule::SeventhOfTheNight,
                ..base
            },
        }
    }
}

impl Default for CalculationMethod {
    fn default() -> Self {
        Self::MuslimWorldLeague
    }
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase and drop separators so "Muslim World League",
/// "muslim_world_league" and "MuslimWorldLeague" compare equal.
fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for CalculationMethod {
    type Err = MiqatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match normalize_name(s).as_str() {
            "muslimworldleague" | "mwl" => Self::MuslimWorldLeague,
            "egyptian" | "egypt" => Self::Egyptian,
            "karachi" => Self::Karachi,
            "ummalqura" | "makkah" => Self::UmmAlQura,
            "dubai" | "gulf" => Self::Dubai,
            "qatar" => Self::Qatar,
            "kuwait" => Self::Kuwait,
            "singapore" => Self::Singapore,
            "turkey" | "diyanet" => Self::Turkey,
            "northamerica" | "isna" => Self::NorthAmerica,
            "moonsightingcommittee" | "moonsighting" => Self::MoonsightingCommittee,
            _ => return Err(MiqatError::UnknownMethod(s.to_string())),
        };
        Ok(method)
    }
}

/// How Isha is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IshaRule {
    /// Sun depression angle in degrees.
    Angle(f64),
    /// Fixed minutes after Maghrib.
    Interval(u32),
}

/// Asr juristic convention: shadow length factor 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AsrMethod {
    #[default]
    Standard,
    Hanafi,
}

impl AsrMethod {
    pub fn shadow_factor(self) -> f64 {
        match self {
            AsrMethod::Standard => 1.0,
            AsrMethod::Hanafi => 2.0,
        }
    }
}

impl FromStr for AsrMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "standard" | "shafi" | "shafii" => Ok(AsrMethod::Standard),
            "hanafi" => Ok(AsrMethod::Hanafi),
            _ => Err(format!("Unknown Asr method '{}'. Use 'standard' or 'hanafi'.", s)),
        }
    }
}

/// Fallback used when Fajr or Isha cannot be solved from the sun angle,
/// or falls outside the safe portion of the night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HighLatitudeRule {
    /// No fallback: unsolvable events are reported as errors.
    None,
    /// Fajr/Isha no further than half the night from sunrise/sunset.
    #[default]
    MiddleOfTheNight,
    /// Fajr/Isha no further than a seventh of the night.
    SeventhOfTheNight,
    /// Portion of the night equal to angle/60.
    TwilightAngle,
}

impl HighLatitudeRule {
    /// Portion of the night allotted to a twilight of `angle` degrees.
    pub fn night_portion(self, angle: f64) -> Option<f64> {
        match self {
            HighLatitudeRule::None => None,
            HighLatitudeRule::MiddleOfTheNight => Some(1.0 / 2.0),
            HighLatitudeRule::SeventhOfTheNight => Some(1.0 / 7.0),
            HighLatitudeRule::TwilightAngle => Some(angle / 60.0),
        }
    }
}

impl FromStr for HighLatitudeRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "none" | "off" => Ok(HighLatitudeRule::None),
            "middleofthenight" | "middle" | "midnight" | "midnightfraction" => Ok(HighLatitudeRule::MiddleOfTheNight),
            "seventhofthenight" | "seventh" => Ok(HighLatitudeRule::SeventhOfTheNight),
            "twilightangle" | "anglebased" | "angle" => Ok(HighLatitudeRule::TwilightAngle),
            _ => Err(format!(
                "Unknown high-latitude rule '{}'. Use 'none', 'middle', 'seventh' or 'angle'.",
                s
            )),
        }
    }
}

/// Per-event minute offsets applied after solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Adjustments {
    pub fajr: i32,
    pub sunrise: i32,
    pub asr: i32,
    pub maghrib: i32,
    pub isha: i32,
}

/// Rounding applied to final timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rounding {
    #[default]
    Nearest,
    Up,
    None,
}

/// Read-only calculation configuration produced by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalculationParameters {
    pub method: CalculationMethod,
    pub fajr_angle: f64,
    pub isha: IshaRule,
    pub asr_method: AsrMethod,
    pub high_latitude_rule: HighLatitudeRule,
    pub dhuhr_offset_minutes: i32,
    pub adjustments: Adjustments,
    pub rounding: Rounding,
}

impl CalculationParameters {
    pub fn with_asr_method(self, asr_method: AsrMethod) -> Self {
        Self { asr_method, ..self }
    }

    pub fn with_high_latitude_rule(self, high_latitude_rule: HighLatitudeRule) -> Self {
        Self { high_latitude_rule, ..self }
    }

    /// Isha depression angle used for night-portion fallbacks.
    /// Interval methods fall back to 18°.
    pub fn isha_angle(&self) -> f64 {
        match self.isha {
            IshaRule::Angle(a) => a,
            IshaRule::Interval(_) => 18.0,
        }
    }
}

impl Default for CalculationParameters {
    fn default() -> Self {
        CalculationMethod::default().parameters()
    }
}

/// Resolve a method name leniently. Unknown names fall back to Muslim World League.
pub fn resolve_method(name: &str) -> CalculationParameters {
    match name.parse::<CalculationMethod>() {
        Ok(method) => method.parameters(),
        Err(e) => {
            tracing::warn!("{}; falling back to {}", e, CalculationMethod::MuslimWorldLeague);
            CalculationMethod::MuslimWorldLeague.parameters()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mwl_parameters() {
        let p = resolve_method("MuslimWorldLeague");
        assert_eq!(p.method, CalculationMethod::MuslimWorldLeague);
        assert_eq!(p.fajr_angle, 18.0);
        assert_eq!(p.isha, IshaRule::Angle(17.0));
        assert_eq!(p.asr_method, AsrMethod::Standard);
    }

    #[test]
    fn test_egyptian_and_umm_al_qura() {
        let eg = resolve_method("Egyptian");
        assert_eq!(eg.fajr_angle, 19.5);
        assert_eq!(eg.isha, IshaRule::Angle(17.5));

        let uq = resolve_method("UmmAlQura");
        assert_eq!(uq.fajr_angle, 18.5);
        assert_eq!(uq.isha, IshaRule::Interval(90));
        assert_eq!(uq.isha_angle(), 18.0);
    }

    #[test]
    fn test_unknown_method_falls_back() {
        let p = resolve_method("NotARealMethod");
        assert_eq!(p.method, CalculationMethod::MuslimWorldLeague);
        let empty = resolve_method("");
        assert_eq!(empty.method, CalculationMethod::MuslimWorldLeague);
    }

    #[test]
    fn test_strict_parse_rejects_unknown() {
        let err = "Atlantis".parse::<CalculationMethod>().unwrap_err();
        assert_eq!(err, MiqatError::UnknownMethod("Atlantis".into()));
    }

    #[test]
    fn test_lenient_name_forms() {
        for name in ["muslim world league", "MUSLIM_WORLD_LEAGUE", "mwl", "Muslim-World-League"] {
            assert_eq!(name.parse::<CalculationMethod>().unwrap(), CalculationMethod::MuslimWorldLeague, "{}", name);
        }
        assert_eq!("isna".parse::<CalculationMethod>().unwrap(), CalculationMethod::NorthAmerica);
        assert_eq!("Makkah".parse::<CalculationMethod>().unwrap(), CalculationMethod::UmmAlQura);
    }

    #[test]
    fn test_name_roundtrip_for_all_methods() {
        for m in CalculationMethod::ALL {
            assert_eq!(m.name().parse::<CalculationMethod>().unwrap(), m);
            assert_eq!(m.parameters().method, m);
        }
    }

    #[test]
    fn test_all_angles_positive() {
        for m in CalculationMethod::ALL {
            let p = m.parameters();
            assert!(p.fajr_angle > 0.0, "{} fajr angle", m);
            assert!(p.isha_angle() > 0.0, "{} isha angle", m);
        }
    }

    #[test]
    fn test_overrides_do_not_touch_registry() {
        let hanafi = resolve_method("Karachi").with_asr_method(AsrMethod::Hanafi);
        assert_eq!(hanafi.asr_method, AsrMethod::Hanafi);
        assert_eq!(resolve_method("Karachi").asr_method, AsrMethod::Standard);
    }

    #[test]
    fn test_night_portions() {
        assert_eq!(HighLatitudeRule::MiddleOfTheNight.night_portion(18.0), Some(0.5));
        assert_eq!(HighLatitudeRule::SeventhOfTheNight.night_portion(18.0), Some(1.0 / 7.0));
        assert_eq!(HighLatitudeRule::TwilightAngle.night_portion(18.0), Some(0.3));
        assert_eq!(HighLatitudeRule::None.night_portion(18.0), None);
    }

    #[test]
    fn test_rule_and_asr_parsing() {
        assert_eq!("midnight".parse::<HighLatitudeRule>().unwrap(), HighLatitudeRule::MiddleOfTheNight);
        assert_eq!("middle".parse::<HighLatitudeRule>().unwrap(), HighLatitudeRule::MiddleOfTheNight);
        assert_eq!("angle-based".parse::<HighLatitudeRule>().unwrap(), HighLatitudeRule::TwilightAngle);
        assert!("polar".parse::<HighLatitudeRule>().is_err());
        assert_eq!("Hanafi".parse::<AsrMethod>().unwrap(), AsrMethod::Hanafi);
        assert!("maliki".parse::<AsrMethod>().is_err());
    }
}
