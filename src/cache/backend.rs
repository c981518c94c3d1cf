//! Cache backend implementations.

use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One stored audio payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Bytes,
    pub created_at: Instant,
    pub size: usize,
}

impl CacheEntry {
    pub fn new(key: CacheKey, data: Bytes) -> Self {
        Self::new_at(key, data, Instant::now())
    }

    pub(crate) fn new_at(key: CacheKey, data: Bytes, created_at: Instant) -> Self {
        let size = data.len();
        Self {
            key,
            data,
            created_at,
            size,
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Result of a store attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOutcome {
    /// False when the entry was larger than the whole budget.
    pub stored: bool,
    pub evicted: usize,
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>>;
    async fn put(&self, key: &CacheKey, data: Bytes) -> Result<PutOutcome>;
    async fn remove(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    /// Live (unexpired) entries.
    async fn len(&self) -> Result<usize>;
    async fn size_bytes(&self) -> Result<usize>;
    /// Physically drop expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    total_size: usize,
}

/// In-memory store bounded by a byte budget with time-based expiry.
///
/// Expiry is by age only; reads never extend an entry's life. When an insert
/// would exceed the budget, expired entries go first, then the oldest.
pub struct MemoryCache {
    state: RwLock<MemoryState>,
    max_size_bytes: usize,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(max_size_bytes: usize, ttl: Duration) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                entries: HashMap::new(),
                total_size: 0,
            }),
            max_size_bytes,
            ttl,
        }
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn remove_locked(state: &mut MemoryState, hash: &str) -> bool {
        match state.entries.remove(hash) {
            Some(old) => {
                state.total_size -= old.size;
                true
            }
            None => false,
        }
    }

    fn purge_locked(&self, state: &mut MemoryState) -> usize {
        let ttl = self.ttl;
        let before = state.entries.len();
        let mut freed = 0;
        state.entries.retain(|_, e| {
            let keep = !e.is_expired(ttl);
            if !keep {
                freed += e.size;
            }
            keep
        });
        state.total_size -= freed;
        before - state.entries.len()
    }

    fn insert_entry(&self, entry: CacheEntry) -> PutOutcome {
        if entry.size > self.max_size_bytes {
            return PutOutcome::default();
        }
        let mut state = self.state.write();
        Self::remove_locked(&mut state, &entry.key.hash);

        let mut evicted = 0;
        if state.total_size + entry.size > self.max_size_bytes {
            evicted += self.purge_locked(&mut state);
        }
        while state.total_size + entry.size > self.max_size_bytes {
            let oldest = state
                .entries
                .values()
                .min_by_key(|e| e.created_at)
                .map(|e| e.key.hash.clone());
            match oldest {
                Some(hash) => {
                    Self::remove_locked(&mut state, &hash);
                    evicted += 1;
                }
                None => break,
            }
        }

        state.total_size += entry.size;
        state.entries.insert(entry.key.hash.clone(), entry);
        PutOutcome {
            stored: true,
            evicted,
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>> {
        let state = self.state.read();
        Ok(state
            .entries
            .get(&key.hash)
            .filter(|e| !e.is_expired(self.ttl))
            .map(|e| e.data.clone()))
    }

    async fn put(&self, key: &CacheKey, data: Bytes) -> Result<PutOutcome> {
        Ok(self.insert_entry(CacheEntry::new(key.clone(), data)))
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(Self::remove_locked(&mut self.state.write(), &key.hash))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        state.entries.clear();
        state.total_size = 0;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .state
            .read()
            .entries
            .values()
            .filter(|e| !e.is_expired(self.ttl))
            .count())
    }

    async fn size_bytes(&self) -> Result<usize> {
        Ok(self.state.read().total_size)
    }

    async fn purge_expired(&self) -> Result<usize> {
        Ok(self.purge_locked(&mut self.state.write()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Stores nothing. Used when caching is disabled.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Bytes>> {
        Ok(None)
    }
    async fn put(&self, _: &CacheKey, _: Bytes) -> Result<PutOutcome> {
        Ok(PutOutcome::default())
    }
    async fn remove(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    async fn size_bytes(&self) -> Result<usize> {
        Ok(0)
    }
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VoiceProfile;

    fn key(text: &str) -> CacheKey {
        CacheKey::generate(text, "v", &VoiceProfile::default())
    }

    #[tokio::test]
    async fn test_budget_evicts_oldest_first() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        let first = key("first");
        let second = key("second");

        let out = cache.put(&first, Bytes::from(vec![1u8; 60])).await.unwrap();
        assert_eq!(out, PutOutcome { stored: true, evicted: 0 });
        let out = cache.put(&second, Bytes::from(vec![2u8; 60])).await.unwrap();
        assert_eq!(out, PutOutcome { stored: true, evicted: 1 });

        assert!(cache.get(&first).await.unwrap().is_none());
        assert_eq!(cache.get(&second).await.unwrap().unwrap().len(), 60);
        assert_eq!(cache.size_bytes().await.unwrap(), 60);
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oversized_entry_is_skipped() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        cache.put(&key("small"), Bytes::from_static(b"abc")).await.unwrap();
        let out = cache.put(&key("huge"), Bytes::from(vec![0u8; 101])).await.unwrap();
        assert!(!out.stored);
        // existing content untouched
        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(cache.size_bytes().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_replacing_key_does_not_double_count() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        let k = key("same");
        cache.put(&k, Bytes::from(vec![0u8; 70])).await.unwrap();
        let out = cache.put(&k, Bytes::from(vec![0u8; 80])).await.unwrap();
        assert_eq!(out.evicted, 0);
        assert_eq!(cache.size_bytes().await.unwrap(), 80);
    }

    #[tokio::test]
    async fn test_expired_entries_unreachable_then_purged() {
        let cache = MemoryCache::new(1_000, Duration::from_secs(60));
        let stale = key("stale");
        let fresh = key("fresh");
        let old = Instant::now() - Duration::from_secs(61);
        cache.insert_entry(CacheEntry::new_at(stale.clone(), Bytes::from_static(b"old"), old));
        cache.put(&fresh, Bytes::from_static(b"new")).await.unwrap();

        assert!(cache.get(&stale).await.unwrap().is_none());
        assert_eq!(cache.len().await.unwrap(), 1);
        // still physically present until purged
        assert_eq!(cache.size_bytes().await.unwrap(), 6);
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.size_bytes().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_expired_entries_evicted_before_live_ones() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        let old = Instant::now() - Duration::from_secs(120);
        cache.insert_entry(CacheEntry::new_at(key("a"), Bytes::from(vec![0u8; 40]), old));
        cache.put(&key("b"), Bytes::from(vec![0u8; 40])).await.unwrap();
        let out = cache.put(&key("c"), Bytes::from(vec![0u8; 40])).await.unwrap();
        assert_eq!(out.evicted, 1);
        assert!(cache.get(&key("b")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_null_cache() {
        let cache = NullCache::new();
        let out = cache.put(&key("x"), Bytes::from_static(b"1")).await.unwrap();
        assert!(!out.stored);
        assert!(cache.get(&key("x")).await.unwrap().is_none());
        assert_eq!(cache.name(), "null");
    }
}
