//! 音频缓存模块：按内容寻址、带 TTL 与字节预算的合成结果缓存。
//!
//! # Audio Cache
//!
//! Synthesized audio is stored under a [`CacheKey`] derived from the
//! normalized text, the voice, and the [`VoiceProfile`](crate::types::VoiceProfile)
//! used. Entries expire by age (not by access) and the total stored size never
//! exceeds the configured byte budget.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AudioCache`] | Front end with statistics; never fails a caller |
//! | [`CacheConfig`] | TTL, byte budget, enabled flag |
//! | [`CacheBackend`] | Trait for pluggable stores |
//! | [`MemoryCache`] | In-memory store, oldest-first eviction |
//! | [`NullCache`] | No-op store for disabled caching |
//! | [`CacheKey`] | SHA-256 key over text, voice and profile |
//!
//! ```rust
//! use resilient_tts::cache::{AudioCache, CacheConfig};
//! use std::time::Duration;
//!
//! let cache = AudioCache::new(
//!     CacheConfig::new()
//!         .with_ttl(Duration::from_secs(3600))
//!         .with_max_size_bytes(8 * 1024 * 1024),
//! );
//! assert!(cache.is_enabled());
//! ```

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, CacheEntry, MemoryCache, NullCache, PutOutcome};
pub use key::{normalize_text, CacheKey, CacheKeyGenerator};
pub use manager::{AudioCache, CacheConfig, CacheStats};
