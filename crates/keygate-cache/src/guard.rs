// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fail-open cache access.
//!
//! [`CacheGuard`] wraps a [`CacheStore`] and is the only way business code
//! touches the cache. Every call runs under the configured deadline; an error
//! or timeout is logged at `warn` and replaced by the fail-open default:
//!
//! | Operation | Fail-open default |
//! |-----------|-------------------|
//! | `get` | miss |
//! | `set` | skipped |
//! | `delete` / `delete_by_pattern` | skipped |
//!
//! The source of truth is never wrapped. Errors from a loader passed to
//! [`CacheGuard::get_or_load`] propagate unchanged.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::traits::{CacheConfig, CacheStore};

/// Fail-open wrapper around a shared cache backend.
#[derive(Clone)]
pub struct CacheGuard {
    store: Arc<dyn CacheStore>,
    timeout: Duration,
    metrics: Option<CacheMetrics>,
}

impl std::fmt::Debug for CacheGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGuard")
            .field("backend", &self.store.backend_name())
            .field("timeout", &self.timeout)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl CacheGuard {
    /// Wraps a backend using the configured deadline.
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            timeout: config.operation_timeout,
            metrics: None,
        }
    }

    /// Attaches metrics.
    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The wrapped backend, for callers that need strict semantics.
    pub fn backend(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs one cache operation. `None` means it failed open.
    pub async fn run<T, F>(&self, operation: &'static str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let error = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => CacheError::timeout(operation, self.timeout),
        };

        warn!(
            operation,
            key,
            backend = self.store.backend_name(),
            error = %error,
            "Cache operation failed, continuing without cache"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(operation, error.error_type());
        }
        None
    }

    /// Reads a raw value. Failures read as a miss.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let value = self.run("get", key, self.store.get(key)).await.flatten();
        if let Some(metrics) = &self.metrics {
            if value.is_some() {
                metrics.record_hit();
            } else {
                metrics.record_miss();
            }
        }
        value
    }

    /// Reads and decodes a value. Undecodable entries read as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => {
                debug!(key, "Cache hit");
                Some(decoded)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                self.delete(key).await;
                None
            }
        }
    }

    /// Writes a raw value. Failures are skipped.
    pub async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.run("set", key, self.store.set(key, value, ttl)).await;
    }

    /// Encodes and writes a value. Failures are skipped.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json, ttl).await,
            Err(e) => {
                let error = CacheError::serialization(key, e.to_string());
                warn!(key, error = %error, "Skipping cache write");
            }
        }
    }

    /// Deletes a key. Failures are skipped.
    pub async fn delete(&self, key: &str) {
        if self.run("delete", key, self.store.delete(key)).await.is_some() {
            if let Some(metrics) = &self.metrics {
                metrics.record_invalidation(false);
            }
        }
    }

    /// Deletes every key matching a glob. Failures are skipped.
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        match self
            .run("delete_by_pattern", pattern, self.store.delete_by_pattern(pattern))
            .await
        {
            Some(removed) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_invalidation(true);
                }
                removed
            }
            None => 0,
        }
    }

    /// Cache-aside read.
    ///
    /// Serves `key` from cache when present, otherwise awaits `load`, writes
    /// the result back with `ttl` and returns it. Loader errors propagate.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, ttl: Duration, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get_json::<T>(key).await {
            return Ok(hit);
        }
        debug!(key, "Cache miss, loading from source");
        let loaded = load().await?;
        self.set_json(key, &loaded, ttl).await;
        Ok(loaded)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCache;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<serde_json::Value>> {
            Err(CacheError::unavailable("connection refused"))
        }
        async fn set(&self, _key: &str, _v: serde_json::Value, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::unavailable("connection refused"))
        }
        async fn delete(&self, _key: &str) -> CacheResult<()> {
            Err(CacheError::unavailable("connection refused"))
        }
        async fn delete_by_pattern(&self, _pattern: &str) -> CacheResult<u64> {
            Err(CacheError::unavailable("connection refused"))
        }
    }

    struct SlowCache;

    #[async_trait]
    impl CacheStore for SlowCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<serde_json::Value>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(json!("late")))
        }
        async fn set(&self, _key: &str, _v: serde_json::Value, _ttl: Duration) -> CacheResult<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
        async fn delete(&self, _key: &str) -> CacheResult<()> {
            Ok(())
        }
        async fn delete_by_pattern(&self, _pattern: &str) -> CacheResult<u64> {
            Ok(0)
        }
    }

    fn guard(store: Arc<dyn CacheStore>) -> CacheGuard {
        CacheGuard::new(store, &CacheConfig::for_testing())
    }

    #[tokio::test]
    async fn test_get_or_load_populates_then_hits() {
        let cache = guard(Arc::new(MemoryCache::new()));
        let loads = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..3 {
            let value: Result<Vec<String>, ()> = cache
                .get_or_load("roles:all", ttl, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["admin".to_string()])
                })
                .await;
            assert_eq!(value.unwrap(), vec!["admin"]);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_fail_open() {
        let cache = guard(Arc::new(BrokenCache));
        assert!(cache.get("k").await.is_none());
        cache.set("k", json!(1), Duration::from_secs(1)).await;
        cache.delete("k").await;
        assert_eq!(cache.delete_by_pattern("k*").await, 0);

        let loaded: Result<u32, ()> = cache
            .get_or_load("k", Duration::from_secs(1), || async { Ok(7) })
            .await;
        assert_eq!(loaded.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_timeouts_fail_open() {
        let cache = guard(Arc::new(SlowCache));
        let started = std::time::Instant::now();
        assert!(cache.get("k").await.is_none());
        cache.set("k", json!(1), Duration::from_secs(1)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_loader_errors_propagate() {
        let cache = guard(Arc::new(MemoryCache::new()));
        let result: Result<u32, &str> = cache
            .get_or_load("k", Duration::from_secs(1), || async { Err("store down") })
            .await;
        assert_eq!(result.unwrap_err(), "store down");
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_miss() {
        let backend = Arc::new(MemoryCache::new());
        backend
            .set("k", json!("not a number"), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = guard(backend.clone());
        assert!(cache.get_json::<u32>("k").await.is_none());
        assert!(!backend.contains_key("k"));
    }

    #[tokio::test]
    async fn test_metrics_record_failures() {
        let registry = prometheus::Registry::new();
        let metrics = CacheMetrics::register(&registry).unwrap();
        let cache = guard(Arc::new(BrokenCache)).with_metrics(metrics.clone());
        cache.get("k").await;
        assert_eq!(metrics.failures("get"), 1);
        assert_eq!(metrics.misses(), 1);
    }
}
