//! Degrade-safe TTL cache for derived read data.
//!
//! [`Cache`] is an explicitly constructed handle over an optional
//! [`CacheBackend`]. Every failure (no backend configured, a miss, a backend
//! error, a value that no longer decodes) looks the same to the caller: a
//! miss. Writes and invalidations are fire-and-forget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::metrics::AppMetrics;

/// TTL per kind of cached data.
pub struct CacheTtl;

impl CacheTtl {
    pub const CURRENT: Duration = Duration::from_secs(120);
    pub const HISTORICAL: Duration = Duration::from_secs(3600);
    pub const LOCATIONS: Duration = Duration::from_secs(86_400);
    pub const SUMMARY: Duration = Duration::from_secs(180);
    pub const TEMPERATURE: Duration = Duration::from_secs(300);
}

/// Key patterns purged after every ingestion cycle.
pub const POST_CYCLE_PATTERNS: &[&str] = &[
    "cities:*",
    "aqi:*",
    "dashboard:*",
    "temperature:*",
    "alerts:*",
    "search:*",
];

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {message}")]
    Backend { message: String },

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A TTL-capable string key-value store.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration)
        -> Result<(), CacheError>;

    /// Keys matching a glob pattern (`*` and `?`).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete the given keys. Returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Release backend resources.
    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process backend. Expiry follows the Tokio clock, so a paused runtime
/// controls it.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, CacheError> {
        self.entries.lock().map_err(|_| CacheError::Backend {
            message: "memory cache lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut entries = self.lock()?;
        Ok(keys.iter().filter(|key| entries.remove(*key).is_some()).count() as u64)
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.lock()?.clear();
        Ok(())
    }
}

/// Glob match supporting `*` (any run, including empty) and `?` (one char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Cache handle shared by read callers and the ingestion scheduler.
#[derive(Clone, Default)]
pub struct Cache {
    backend: Option<Arc<dyn CacheBackend>>,
    metrics: Option<Arc<AppMetrics>>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
            metrics: None,
        }
    }

    /// A cache with no backend: every read misses, every write is dropped.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;

        let value = match backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!("Cache value for {} did not decode: {}", key, err);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("Cache GET failed for key {}: {}", key, err);
                None
            }
        };

        if let Some(metrics) = &self.metrics {
            if value.is_some() {
                metrics.cache_hits_total.inc();
            } else {
                metrics.cache_misses_total.inc();
            }
        }

        value
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = &self.backend else {
            return;
        };

        let result = match serde_json::to_string(value) {
            Ok(raw) => backend.set_with_expiry(key, raw, ttl).await,
            Err(err) => Err(CacheError::from(err)),
        };

        if let Err(err) = result {
            tracing::warn!("Cache SET failed for key {}: {}", key, err);
        }
    }

    /// Delete every key matching `pattern`. Returns how many were removed.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let Some(backend) = &self.backend else {
            return 0;
        };

        let result = async {
            let keys = backend.keys(pattern).await?;
            if keys.is_empty() {
                return Ok(0);
            }
            backend.delete(&keys).await
        }
        .await;

        match result {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!("Cache invalidate failed for pattern {}: {}", pattern, err);
                0
            }
        }
    }

    pub async fn invalidate_all(&self, patterns: &[&str]) -> u64 {
        let mut removed = 0;
        for pattern in patterns {
            removed += self.invalidate(pattern).await;
        }
        removed
    }

    pub async fn close(&self) {
        if let Some(backend) = &self.backend {
            if let Err(err) = backend.close().await {
                tracing::warn!("Cache close failed: {}", err);
            }
        }
    }
}
