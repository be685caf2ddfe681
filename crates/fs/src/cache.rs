//! Freshness caches for path attributes and directory listings
//!
//! Entries carry their own TTL and are dropped once it has elapsed; there is
//! no capacity bound. A miss is answered by a [`Fetch`] provider and the
//! result stored; provider errors are returned as-is and never cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::sync::Cache;
use moka::Expiry;
use serde::{Deserialize, Serialize};

use crate::attr::{DirListing, PathAttr};
use crate::paths;

pub const DEFAULT_TTL_SECS: u64 = 15;
pub const DEFAULT_SIZE_PROBE_CONCURRENCY: usize = 8;
pub const DEFAULT_NEGATIVE_TTL_SECS: u64 = 10;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for attributes and listings in seconds
    pub ttl_secs: u64,
    /// How many per-child size probes a listing runs at once
    pub size_probe_concurrency: usize,
    /// How long a path that failed lookup is answered as missing
    pub negative_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            size_probe_concurrency: DEFAULT_SIZE_PROBE_CONCURRENCY,
            negative_ttl_secs: DEFAULT_NEGATIVE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }
}

/// Produces the value for a path on a cache miss
#[async_trait]
pub trait Fetch<V>: Send + Sync {
    type Error: Send;

    async fn fetch(&self, path: &str) -> Result<V, Self::Error>;
}

/// A cached value with the instant it was recorded and how long it stays valid
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    recorded_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            recorded_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.recorded_at.elapsed() < self.ttl
    }

    pub fn value(&self) -> &V {
        &self.value
    }
}

/// Expires each entry after its own TTL, restarting the clock on overwrite
struct EntryExpiry;

impl<V> Expiry<String, CacheEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Path-keyed cache where every entry expires after a TTL
#[derive(Clone)]
pub struct TtlCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    ttl: Duration,
}

/// Attribute cache: path → attributes
pub type AttrCache = TtlCache<PathAttr>;

/// Directory cache: path → listing
pub type DirCache = TtlCache<Arc<DirListing>>;

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache whose provider-filled entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().expire_after(EntryExpiry).build(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `path`, if any, without touching the provider
    pub fn get_fresh(&self, path: &str) -> Option<V> {
        self.entries
            .get(&paths::normalize(path))
            .filter(CacheEntry::is_fresh)
            .map(|entry| entry.value)
    }

    /// Fresh value for `path`, fetching and storing it on a miss
    pub async fn get<F>(&self, path: &str, provider: &F) -> Result<V, F::Error>
    where
        F: Fetch<V> + ?Sized,
    {
        let key = paths::normalize(path);
        if let Some(value) = self.get_fresh(&key) {
            tracing::trace!(path = %key, "cache hit");
            return Ok(value);
        }

        tracing::debug!(path = %key, "cache miss");
        let value = provider.fetch(&key).await?;
        self.entries
            .insert(key, CacheEntry::new(value.clone(), self.ttl));
        Ok(value)
    }

    /// Install a value with the configured TTL
    pub fn preload(&self, path: &str, value: V) {
        self.preload_with_ttl(path, value, self.ttl);
    }

    /// Install a value unconditionally, bypassing the provider
    pub fn preload_with_ttl(&self, path: &str, value: V, ttl: Duration) {
        self.entries
            .insert(paths::normalize(path), CacheEntry::new(value, ttl));
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl<V> std::fmt::Debug for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub attr_count: u64,
    pub dir_count: u64,
    pub missing_count: u64,
    pub ttl_secs: u64,
    pub negative_ttl_secs: u64,
    pub size_probe_concurrency: usize,
}
