//! In-process response cache with fresh and stale windows.
//!
//! Entries are keyed by [`WeatherRequest::cache_key`](crate::model::WeatherRequest::cache_key)
//! and superseded wholesale on the next successful fetch. Expiry is lazy:
//! reads drop entries older than `ttl_fresh + stale_window`, and
//! [`WeatherCache::sweep`] removes the ones nobody reads again.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::model::CacheSettings;
use crate::model::UnifiedWeatherResponse;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: UnifiedWeatherResponse,
    pub created_at: Instant,
    pub ttl_fresh: Duration,
}

impl CacheEntry {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Age within `ttl_fresh`.
    Fresh(UnifiedWeatherResponse),
    /// Past `ttl_fresh` but inside the stale window; `is_stale` is set.
    Stale(UnifiedWeatherResponse),
    Miss,
}

#[derive(Debug)]
pub struct WeatherCache {
    settings: CacheSettings,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl WeatherCache {
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, key: &str) -> CacheLookup {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get(key) else {
            return CacheLookup::Miss;
        };

        let age = entry.age(now);
        if age <= entry.ttl_fresh {
            CacheLookup::Fresh(entry.value.clone())
        } else if age <= entry.ttl_fresh.saturating_add(self.settings.stale_window) {
            let mut value = entry.value.clone();
            value.is_stale = true;
            CacheLookup::Stale(value)
        } else {
            entries.remove(key);
            CacheLookup::Miss
        }
    }

    /// Store a fresh result, replacing whatever was cached for `key`.
    pub fn store(&self, key: &str, value: UnifiedWeatherResponse) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            created_at: Instant::now(),
            ttl_fresh: self.settings.ttl_fresh,
        };
        self.entries.lock().insert(key.to_string(), entry);
    }

    /// Drop every entry past its maximum stale age. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.settings.stale_window;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.age(now) <= entry.ttl_fresh.saturating_add(window));
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
