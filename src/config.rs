//! User settings: calculation method, juristic options, saved location and
//! notification preferences.
//!
//! Settings live in the key-value store under separate keys so each part
//! can be updated on its own. Partial documents merge over the defaults.
//! `MIQAT_METHOD`, `MIQAT_ASR` and `MIQAT_HIGH_LAT` override stored values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, instrument, warn};

use crate::location::ResolvedLocation;
use crate::method::{AsrMethod, CalculationMethod, CalculationParameters, HighLatitudeRule};
use crate::navigator::Prayer;
use crate::store::{self, KeyValueStore, StoreError};

pub const ENV_METHOD: &str = "MIQAT_METHOD";
pub const ENV_ASR: &str = "MIQAT_ASR";
pub const ENV_HIGH_LAT: &str = "MIQAT_HIGH_LAT";

/// Reminder lead time used when nothing is configured.
pub const DEFAULT_REMINDER_MINUTES: u32 = 10;

/// The last successfully resolved location.
pub type SavedLocation = ResolvedLocation;

/// Per-prayer notification switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrayerToggles {
    pub fajr: bool,
    pub dhuhr: bool,
    pub asr: bool,
    pub maghrib: bool,
    pub isha: bool,
}

impl Default for PrayerToggles {
    fn default() -> Self {
        Self { fajr: true, dhuhr: true, asr: true, maghrib: true, isha: true }
    }
}

impl PrayerToggles {
    pub fn is_enabled(&self, prayer: Prayer) -> bool {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub reminder_minutes: u32,
    pub prayers: PrayerToggles,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_minutes: DEFAULT_REMINDER_MINUTES,
            prayers: PrayerToggles::default(),
        }
    }
}

/// Juristic options stored under `app_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AppSettings {
    asr_method: AsrMethod,
    high_latitude_rule: Option<HighLatitudeRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub method: CalculationMethod,
    pub asr_method: AsrMethod,
    /// `None` keeps the method's own rule.
    pub high_latitude_rule: Option<HighLatitudeRule>,
    pub location: Option<SavedLocation>,
    pub notifications: NotificationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            method: CalculationMethod::default(),
            asr_method: AsrMethod::default(),
            high_latitude_rule: None,
            location: None,
            notifications: NotificationSettings::default(),
        }
    }
}

/// Read a stored value, treating malformed documents as absent.
fn read_or_default<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store::get_as(store, key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "ignoring stored setting");
            None
        }
    }
}

impl Settings {
    /// Load from the store, falling back to defaults key by key.
    #[instrument(skip(store))]
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut settings = Settings::default();

        if let Some(name) = read_or_default::<String>(store, store::PRAYER_METHOD) {
            match name.parse() {
                Ok(method) => settings.method = method,
                Err(e) => warn!(error = %e, "stored method ignored"),
            }
        }
        if let Some(app) = read_or_default::<AppSettings>(store, store::APP_SETTINGS) {
            settings.asr_method = app.asr_method;
            settings.high_latitude_rule = app.high_latitude_rule;
        }
        settings.location = read_or_default(store, store::USER_LOCATION);
        if let Some(notifications) = read_or_default(store, store::NOTIFICATION_SETTINGS) {
            settings.notifications = notifications;
        }

        debug!(method = %settings.method, has_location = settings.location.is_some(), "settings loaded");
        settings
    }

    /// Load from the store and apply process environment overrides.
    pub fn from_env(store: &dyn KeyValueStore) -> Self {
        let mut settings = Self::load(store);
        settings.apply_overrides(|key| env::var(key).ok());
        settings
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Unparseable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_METHOD) {
            match raw.parse() {
                Ok(method) => self.method = method,
                Err(e) => warn!(var = ENV_METHOD, error = %e, "override ignored"),
            }
        }
        if let Some(raw) = lookup(ENV_ASR) {
            match raw.parse() {
                Ok(asr) => self.asr_method = asr,
                Err(e) => warn!(var = ENV_ASR, error = %e, "override ignored"),
            }
        }
        if let Some(raw) = lookup(ENV_HIGH_LAT) {
            match raw.parse() {
                Ok(rule) => self.high_latitude_rule = Some(rule),
                Err(e) => warn!(var = ENV_HIGH_LAT, error = %e, "override ignored"),
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store::set_as(store, store::PRAYER_METHOD, &self.method.name())?;
        let app = AppSettings { asr_method: self.asr_method, high_latitude_rule: self.high_latitude_rule };
        store::set_as(store, store::APP_SETTINGS, &app)?;
        store::set_as(store, store::NOTIFICATION_SETTINGS, &self.notifications)?;
        match &self.location {
            Some(location) => store::set_as(store, store::USER_LOCATION, location),
            None => store.remove(store::USER_LOCATION),
        }
    }

    /// Effective calculation parameters.
    pub fn parameters(&self) -> CalculationParameters {
        let params = self.method.parameters().with_asr_method(self.asr_method);
        match self.high_latitude_rule {
            Some(rule) => params.with_high_latitude_rule(rule),
            None => params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationSource;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::HashMap;

    fn sample_location() -> ResolvedLocation {
        ResolvedLocation {
            name: "Cairo".into(),
            latitude: 30.0444,
            longitude: 31.2357,
            tz: "Africa/Cairo".into(),
            source: LocationSource::Builtin,
            country_code: Some("EG".into()),
        }
    }

    #[test]
    fn test_defaults_on_empty_store() {
        let settings = Settings::load(&MemoryStore::new());
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.notifications.reminder_minutes, 10);
        assert!(settings.notifications.enabled);
        assert_eq!(settings.parameters(), CalculationMethod::MuslimWorldLeague.parameters());
    }

    #[test]
    fn test_partial_notification_settings_merge() {
        let store = MemoryStore::new();
        store
            .set(store::NOTIFICATION_SETTINGS, json!({"reminderMinutes": 15, "prayers": {"fajr": false}}))
            .unwrap();
        let settings = Settings::load(&store);
        assert!(settings.notifications.enabled);
        assert_eq!(settings.notifications.reminder_minutes, 15);
        assert!(!settings.notifications.prayers.fajr);
        assert!(settings.notifications.prayers.isha);
    }

    #[test]
    fn test_save_and_reload() {
        let store = MemoryStore::new();
        let settings = Settings {
            method: CalculationMethod::Egyptian,
            asr_method: AsrMethod::Hanafi,
            high_latitude_rule: Some(HighLatitudeRule::SeventhOfTheNight),
            location: Some(sample_location()),
            notifications: NotificationSettings { reminder_minutes: 5, ..Default::default() },
        };
        settings.save(&store).unwrap();
        assert_eq!(store.get(store::PRAYER_METHOD), Some(json!("Egyptian")));
        assert_eq!(Settings::load(&store), settings);
    }

    #[test]
    fn test_unknown_stored_method_keeps_default() {
        let store = MemoryStore::new();
        store.set(store::PRAYER_METHOD, json!("Atlantis")).unwrap();
        store.set(store::USER_LOCATION, json!(42)).unwrap();
        let settings = Settings::load(&store);
        assert_eq!(settings.method, CalculationMethod::MuslimWorldLeague);
        assert!(settings.location.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_METHOD, "isna"),
            (ENV_ASR, "hanafi"),
            (ENV_HIGH_LAT, "angle"),
        ]);
        let mut settings = Settings::default();
        settings.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        let params = settings.parameters();
        assert_eq!(params.method, CalculationMethod::NorthAmerica);
        assert_eq!(params.asr_method, AsrMethod::Hanafi);
        assert_eq!(params.high_latitude_rule, HighLatitudeRule::TwilightAngle);
    }

    #[test]
    fn test_bad_env_override_ignored() {
        let mut settings = Settings { method: CalculationMethod::Kuwait, ..Default::default() };
        settings.apply_overrides(|k| (k == ENV_METHOD).then(|| "nonsense".to_string()));
        assert_eq!(settings.method, CalculationMethod::Kuwait);
    }

    #[test]
    fn test_method_rule_kept_without_override() {
        let settings = Settings { method: CalculationMethod::MoonsightingCommittee, ..Default::default() };
        assert_eq!(settings.parameters().high_latitude_rule, HighLatitudeRule::SeventhOfTheNight);
    }

    #[test]
    fn test_toggles() {
        let toggles = PrayerToggles { asr: false, ..Default::default() };
        assert!(!toggles.is_enabled(Prayer::Asr));
        assert!(toggles.is_enabled(Prayer::Maghrib));
    }
}
