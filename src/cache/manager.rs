//! Cache manager.

use super::backend::{KeyPattern, TtlCache};
use super::key::CacheKey;
use crate::clock::Clock;
use crate::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Kind of cached read. TTL is chosen per kind, never per value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// A just-generated plan (read-after-write, short staleness).
    Plan,
    /// Owner profile reads.
    Profile,
    /// Plan history listings.
    History,
    /// Read-heavy reference data such as the equipment catalogue.
    Catalogue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    #[serde(with = "duration_secs")]
    pub plan_ttl: Duration,
    #[serde(with = "duration_secs")]
    pub profile_ttl: Duration,
    #[serde(with = "duration_secs")]
    pub history_ttl: Duration,
    #[serde(with = "duration_secs")]
    pub catalogue_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plan_ttl: Duration::from_secs(300),
            profile_ttl: Duration::from_secs(30),
            history_ttl: Duration::from_secs(60),
            catalogue_ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_ttl(mut self, kind: OperationKind, ttl: Duration) -> Self {
        match kind {
            OperationKind::Plan => self.plan_ttl = ttl,
            OperationKind::Profile => self.profile_ttl = ttl,
            OperationKind::History => self.history_ttl = ttl,
            OperationKind::Catalogue => self.catalogue_ttl = ttl,
        }
        self
    }
    pub fn ttl_for(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::Plan => self.plan_ttl,
            OperationKind::Profile => self.profile_ttl,
            OperationKind::History => self.history_ttl,
            OperationKind::Catalogue => self.catalogue_ttl,
        }
    }
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub invalidations: u64,
    pub expirations: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub(crate) struct AtomicStats {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) puts: AtomicU64,
    pub(crate) invalidations: AtomicU64,
    pub(crate) expirations: AtomicU64,
    pub(crate) errors: AtomicU64,
}

impl AtomicStats {
    pub(crate) fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
    pub(crate) fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Typed front for a [`TtlCache`] holding JSON values.
///
/// One manager serves every operation kind so that a single pattern invalidation reaches
/// all cached reads.
pub struct CacheManager {
    config: CacheConfig,
    cache: TtlCache<serde_json::Value>,
    decode_errors: AtomicU64,
}

impl CacheManager {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            cache: TtlCache::new(clock),
            decode_errors: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached value, or `None` when absent, expired or not decodable as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        let raw = self.cache.get(&key.digest)?;
        match serde_json::from_value(raw) {
            Ok(v) => Some(v),
            Err(_) => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
                self.cache.remove(&key.digest);
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &CacheKey, value: &T, kind: OperationKind) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let data = serde_json::to_value(value)?;
        self.cache.put(key, data, self.config.ttl_for(kind));
        Ok(())
    }

    pub fn invalidate(&self, pattern: impl Into<KeyPattern>) -> usize {
        self.cache.invalidate(pattern)
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.cache.invalidate_prefix(prefix)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.cache.stats();
        stats.errors = self.decode_errors.load(Ordering::Relaxed);
        stats
    }
}
