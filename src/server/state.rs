use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::geo::GeoCoordinate;
use crate::method::CalculationParameters;
use crate::schedule::PrayerTimeSet;

/// Entries kept before the cache is flushed.
const MAX_ENTRIES: usize = 2048;

pub struct AppState {
    pub cache: Mutex<ComputeCache>,
}

impl AppState {
    pub fn new() -> Self {
        Self { cache: Mutex::new(ComputeCache::default()) }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Computed days keyed by coordinate, date and parameters. Values are the
/// UTC sets, so one entry serves every timezone.
#[derive(Default)]
pub struct ComputeCache {
    entries: HashMap<String, PrayerTimeSet>,
    pub hits: u64,
    pub misses: u64,
}

impl ComputeCache {
    pub fn key(coordinate: GeoCoordinate, date: NaiveDate, params: &CalculationParameters) -> String {
        format!(
            "{:.4},{:.4},{},{:?}",
            coordinate.latitude, coordinate.longitude, date, params
        )
    }

    pub fn get(&mut self, key: &str) -> Option<PrayerTimeSet> {
        let found = self.entries.get(key).cloned();
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    pub fn put(&mut self, key: String, times: PrayerTimeSet) {
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.clear();
        }
        self.entries.insert(key, times);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
