//! Audio cache front end with hit/miss accounting.

use super::backend::{CacheBackend, MemoryCache, NullCache};
use super::key::CacheKey;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size_bytes: usize,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_size_bytes: 50 * 1024 * 1024,
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
    pub fn with_max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = bytes;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// Inserts bypassed because the entry exceeded the whole budget.
    pub skipped: u64,
    pub evictions: u64,
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

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    skipped: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Shared audio cache. Backend failures are logged and treated as misses so
/// caching can never fail a synthesis.
pub struct AudioCache {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: AtomicStats,
}

impl AudioCache {
    pub fn new(config: CacheConfig) -> Self {
        let backend: Box<dyn CacheBackend> = if config.enabled {
            Box::new(MemoryCache::new(config.max_size_bytes, config.ttl))
        } else {
            Box::new(NullCache::new())
        };
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: AtomicStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Bytes> {
        if !self.config.enabled {
            return None;
        }
        match self.backend.get(key).await {
            Ok(Some(data)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, bytes = data.len(), "audio cache hit");
                Some(data)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                warn!(backend = self.backend.name(), error = %e, "audio cache read failed");
                None
            }
        }
    }

    /// Store audio; returns whether it was kept.
    pub async fn put(&self, key: &CacheKey, data: Bytes) -> bool {
        if !self.config.enabled || data.is_empty() {
            return false;
        }
        let size = data.len();
        match self.backend.put(key, data).await {
            Ok(outcome) => {
                self.stats
                    .evictions
                    .fetch_add(outcome.evicted as u64, Ordering::Relaxed);
                if outcome.stored {
                    self.stats.stores.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, bytes = size, budget = self.config.max_size_bytes, "entry exceeds cache budget, not cached");
                }
                outcome.stored
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(backend = self.backend.name(), error = %e, "audio cache write failed");
                false
            }
        }
    }

    pub async fn remove(&self, key: &CacheKey) -> bool {
        self.backend.remove(key).await.unwrap_or(false)
    }

    pub async fn purge_expired(&self) -> usize {
        match self.backend.purge_expired().await {
            Ok(n) => {
                self.stats.evictions.fetch_add(n as u64, Ordering::Relaxed);
                n
            }
            Err(e) => {
                warn!(error = %e, "audio cache purge failed");
                0
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.backend.clear().await {
            warn!(error = %e, "audio cache clear failed");
        }
    }

    pub async fn len(&self) -> usize {
        self.backend.len().await.unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn size_bytes(&self) -> usize {
        self.backend.size_bytes().await.unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
