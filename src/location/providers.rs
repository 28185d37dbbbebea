//! Location providers: manual coordinates, built-in city dataset, IP
//! geolocation and the last stored location.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::types::{LocationError, LocationQuery, LocationSource, ResolvedLocation};
use crate::geo::GeoCoordinate;
use crate::store::{self, KeyValueStore};

const IP_API_URL: &str = "https://ipapi.co/json/";
const USER_AGENT: &str = concat!("miqat/", env!("CARGO_PKG_VERSION"));
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// One step of the resolution chain.
///
/// `Ok(None)` means the provider has nothing to offer for this query and
/// the next one should be asked.
pub trait LocationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, query: &LocationQuery) -> Result<Option<ResolvedLocation>, LocationError>;
}

// ─── Manual coordinates ─────────────────────────────────────────

pub struct ManualProvider;

impl LocationProvider for ManualProvider {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn resolve(&self, query: &LocationQuery) -> Result<Option<ResolvedLocation>, LocationError> {
        let Some((lat, lon)) = query.coordinates else {
            return Ok(None);
        };
        let coordinate = GeoCoordinate::new(lat, lon)?;
        Ok(Some(ResolvedLocation {
            name: format!("{:.4}, {:.4}", coordinate.latitude, coordinate.longitude),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            tz: query.tz.clone().unwrap_or_else(|| "UTC".into()),
            source: LocationSource::Manual,
            country_code: None,
        }))
    }
}

// ─── Built-in dataset ───────────────────────────────────────────

struct City {
    /// Display name first, then lowercase search aliases.
    names: &'static [&'static str],
    lat: f64,
    lon: f64,
    tz: &'static str,
    country_code: &'static str,
}

const CITIES: &[City] = &[
    City { names: &["Mecca", "mecca", "makkah", "mekka"], lat: 21.4225, lon: 39.8262, tz: "Asia/Riyadh", country_code: "SA" },
    City { names: &["Medina", "medina", "madinah", "al-madinah"], lat: 24.4686, lon: 39.6142, tz: "Asia/Riyadh", country_code: "SA" },
    City { names: &["Riyadh", "riyadh"], lat: 24.7136, lon: 46.6753, tz: "Asia/Riyadh", country_code: "SA" },
    City { names: &["Jeddah", "jeddah", "jiddah"], lat: 21.4858, lon: 39.1925, tz: "Asia/Riyadh", country_code: "SA" },
    City { names: &["Dubai", "dubai"], lat: 25.2048, lon: 55.2708, tz: "Asia/Dubai", country_code: "AE" },
    City { names: &["Doha", "doha"], lat: 25.2854, lon: 51.5310, tz: "Asia/Qatar", country_code: "QA" },
    City { names: &["Kuwait City", "kuwait city", "kuwait"], lat: 29.3759, lon: 47.9774, tz: "Asia/Kuwait", country_code: "KW" },
    City { names: &["Cairo", "cairo", "al-qahirah"], lat: 30.0444, lon: 31.2357, tz: "Africa/Cairo", country_code: "EG" },
    City { names: &["Istanbul", "istanbul"], lat: 41.0082, lon: 28.9784, tz: "Europe/Istanbul", country_code: "TR" },
    City { names: &["Jerusalem", "jerusalem", "al-quds"], lat: 31.7683, lon: 35.2137, tz: "Asia/Jerusalem", country_code: "IL" },
    City { names: &["Baghdad", "baghdad"], lat: 33.3152, lon: 44.3661, tz: "Asia/Baghdad", country_code: "IQ" },
    City { names: &["Tehran", "tehran"], lat: 35.6892, lon: 51.3890, tz: "Asia/Tehran", country_code: "IR" },
    City { names: &["Karachi", "karachi"], lat: 24.8607, lon: 67.0011, tz: "Asia/Karachi", country_code: "PK" },
    City { names: &["Dhaka", "dhaka", "dacca"], lat: 23.8103, lon: 90.4125, tz: "Asia/Dhaka", country_code: "BD" },
    City { names: &["Delhi", "delhi", "new delhi"], lat: 28.6139, lon: 77.2090, tz: "Asia/Kolkata", country_code: "IN" },
    City { names: &["Mumbai", "mumbai", "bombay"], lat: 19.0760, lon: 72.8777, tz: "Asia/Kolkata", country_code: "IN" },
    City { names: &["Kuala Lumpur", "kuala lumpur", "kl"], lat: 3.1390, lon: 101.6869, tz: "Asia/Kuala_Lumpur", country_code: "MY" },
    City { names: &["Singapore", "singapore"], lat: 1.3521, lon: 103.8198, tz: "Asia/Singapore", country_code: "SG" },
    City { names: &["Jakarta", "jakarta"], lat: -6.2088, lon: 106.8456, tz: "Asia/Jakarta", country_code: "ID" },
    City { names: &["Casablanca", "casablanca", "dar el beida"], lat: 33.5731, lon: -7.5898, tz: "Africa/Casablanca", country_code: "MA" },
    City { names: &["Lagos", "lagos"], lat: 6.5244, lon: 3.3792, tz: "Africa/Lagos", country_code: "NG" },
    City { names: &["Nairobi", "nairobi"], lat: -1.2921, lon: 36.8219, tz: "Africa/Nairobi", country_code: "KE" },
    City { names: &["London", "london"], lat: 51.5074, lon: -0.1278, tz: "Europe/London", country_code: "GB" },
    City { names: &["Paris", "paris"], lat: 48.8566, lon: 2.3522, tz: "Europe/Paris", country_code: "FR" },
    City { names: &["Berlin", "berlin"], lat: 52.5200, lon: 13.4050, tz: "Europe/Berlin", country_code: "DE" },
    City { names: &["Stockholm", "stockholm", "stokholm"], lat: 59.3293, lon: 18.0686, tz: "Europe/Stockholm", country_code: "SE" },
    City { names: &["Oslo", "oslo"], lat: 59.9139, lon: 10.7522, tz: "Europe/Oslo", country_code: "NO" },
    City { names: &["Tromsø", "tromso", "tromsø", "tromsoe"], lat: 69.6492, lon: 18.9553, tz: "Europe/Oslo", country_code: "NO" },
    City { names: &["Longyearbyen", "longyearbyen", "svalbard"], lat: 78.2232, lon: 15.6267, tz: "Arctic/Longyearbyen", country_code: "NO" },
    City { names: &["Moscow", "moscow", "moskva"], lat: 55.7558, lon: 37.6173, tz: "Europe/Moscow", country_code: "RU" },
    City { names: &["New York", "new york", "newyork", "nyc"], lat: 40.7128, lon: -74.0060, tz: "America/New_York", country_code: "US" },
    City { names: &["Los Angeles", "los angeles", "la"], lat: 34.0522, lon: -118.2437, tz: "America/Los_Angeles", country_code: "US" },
    City { names: &["Toronto", "toronto"], lat: 43.6532, lon: -79.3832, tz: "America/Toronto", country_code: "CA" },
    City { names: &["Tokyo", "tokyo"], lat: 35.6762, lon: 139.6503, tz: "Asia/Tokyo", country_code: "JP" },
    City { names: &["Sydney", "sydney"], lat: -33.8688, lon: 151.2093, tz: "Australia/Sydney", country_code: "AU" },
];

/// Maximum Levenshtein distance accepted by the fuzzy pass.
const MAX_FUZZY_DISTANCE: usize = 2;

/// Compute edit distance between two strings (Levenshtein).
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

fn aliases(city: &City) -> &'static [&'static str] {
    &city.names[1..]
}

/// Search the built-in dataset: exact alias, then prefix, then the closest
/// alias within two edits.
pub fn builtin_lookup(query: &str) -> Option<ResolvedLocation> {
    let lowered = query.trim().to_lowercase();
    let q = lowered.as_str();
    if q.is_empty() {
        return None;
    }

    let exact = CITIES.iter().find(|c| aliases(c).contains(&q));
    let prefix = || {
        CITIES
            .iter()
            .find(|c| q.len() >= 3 && aliases(c).iter().any(|name| name.starts_with(q)))
    };
    let fuzzy = || {
        CITIES
            .iter()
            .flat_map(|c| aliases(c).iter().map(move |name| (c, edit_distance(q, name))))
            .filter(|(_, d)| *d <= MAX_FUZZY_DISTANCE)
            .min_by_key(|(_, d)| *d)
            .map(|(c, _)| c)
    };

    exact.or_else(prefix).or_else(fuzzy).map(|city| ResolvedLocation {
        name: city.names[0].to_string(),
        latitude: city.lat,
        longitude: city.lon,
        tz: city.tz.to_string(),
        source: LocationSource::Builtin,
        country_code: Some(city.country_code.to_string()),
    })
}

pub struct BuiltinProvider;

impl LocationProvider for BuiltinProvider {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn resolve(&self, query: &LocationQuery) -> Result<Option<ResolvedLocation>, LocationError> {
        match query.city.as_deref() {
            None => Ok(None),
            Some(city) => builtin_lookup(city)
                .map(Some)
                .ok_or_else(|| LocationError::NotFound(city.to_string())),
        }
    }
}

// ─── IP-based geolocation ───────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    city: Option<String>,
    country_code: Option<String>,
}

impl IpApiResult {
    fn into_location(self) -> Result<ResolvedLocation, LocationError> {
        let latitude = self.latitude.ok_or_else(|| LocationError::InvalidResponse("no latitude".into()))?;
        let longitude = self.longitude.ok_or_else(|| LocationError::InvalidResponse("no longitude".into()))?;
        GeoCoordinate::new(latitude, longitude)?;
        Ok(ResolvedLocation {
            name: self.city.unwrap_or_else(|| format!("{:.4}, {:.4}", latitude, longitude)),
            latitude,
            longitude,
            tz: self.timezone.unwrap_or_else(|| "UTC".into()),
            source: LocationSource::IpApi,
            country_code: self.country_code,
        })
    }
}

/// Auto-detect location via IP geolocation (ipapi.co).
pub fn ip_geolocate() -> Result<ResolvedLocation, LocationError> {
    let response = ureq::get(IP_API_URL)
        .set("User-Agent", USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .call()
        .map_err(|e| LocationError::Network(e.to_string()))?;

    let result: IpApiResult = response
        .into_json()
        .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
    result.into_location()
}

pub struct IpProvider;

impl LocationProvider for IpProvider {
    fn name(&self) -> &'static str {
        "ip"
    }

    fn resolve(&self, _query: &LocationQuery) -> Result<Option<ResolvedLocation>, LocationError> {
        debug!(url = IP_API_URL, "requesting IP geolocation");
        ip_geolocate().map(Some)
    }
}

// ─── Stored location ────────────────────────────────────────────

pub struct StoredProvider {
    store: Arc<dyn KeyValueStore>,
}

impl StoredProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl LocationProvider for StoredProvider {
    fn name(&self) -> &'static str {
        "stored"
    }

    fn resolve(&self, _query: &LocationQuery) -> Result<Option<ResolvedLocation>, LocationError> {
        let stored: Option<ResolvedLocation> = store::get_as(self.store.as_ref(), store::USER_LOCATION)
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
        Ok(stored.map(|loc| ResolvedLocation { source: LocationSource::Stored, ..loc }))
    }
}
