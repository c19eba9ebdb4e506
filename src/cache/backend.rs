//! In-memory TTL cache.

use super::digest::DedupDigest;
use super::key::CacheKey;
use super::manager::{AtomicStats, CacheStats};
use crate::clock::Clock;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached value with its storage time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
    scope: String,
}

impl<V> CacheEntry<V> {
    /// Valid iff `now - stored_at < ttl`. A zero TTL is never valid.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Which part of a key a pattern is matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Scope starts with the given path.
    Prefix(String),
    /// Scope or digest contains the given text.
    Contains(String),
}

impl KeyPattern {
    fn matches<V>(&self, digest: &DedupDigest, entry: &CacheEntry<V>) -> bool {
        match self {
            KeyPattern::Prefix(p) => entry.scope.starts_with(p.as_str()),
            KeyPattern::Contains(s) => {
                entry.scope.contains(s.as_str()) || digest.as_str().contains(s.as_str())
            }
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(s: &str) -> Self {
        KeyPattern::Contains(s.to_string())
    }
}

/// Digest-keyed cache with a per-entry TTL.
///
/// Expired entries are indistinguishable from absent ones and are purged by the read that
/// notices them. There is no size bound and no other eviction policy. All operations are
/// synchronous and hold one coarse lock.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<DedupDigest, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    stats: AtomicStats,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            stats: AtomicStats::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DedupDigest, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, digest: &DedupDigest) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(digest) {
            Some(entry) if entry.is_valid_at(now) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(digest);
                self.stats.expirations.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(digest = digest.short(), "cache entry expired");
                None
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Unconditional overwrite.
    pub fn put(&self, key: &CacheKey, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl,
            scope: key.scope.clone(),
        };
        self.lock().insert(key.digest.clone(), entry);
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remove(&self, digest: &DedupDigest) -> bool {
        self.lock().remove(digest).is_some()
    }

    /// Removes every entry whose key matches `pattern`, expired or not.
    pub fn invalidate(&self, pattern: impl Into<KeyPattern>) -> usize {
        let pattern = pattern.into();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|digest, entry| !pattern.matches(digest, entry));
        let removed = before - entries.len();
        self.stats
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(?pattern, removed, "cache invalidated");
        removed
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.invalidate(KeyPattern::Prefix(prefix.to_string()))
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock().values().filter(|e| e.is_valid_at(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }
}
