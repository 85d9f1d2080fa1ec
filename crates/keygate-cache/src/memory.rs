// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory cache backend.
//!
//! Entries live in a `DashMap` with an absolute expiry instant. Expired
//! entries are dropped lazily on read and by [`MemoryCache::purge_expired`].
//! Pattern deletes compile the glob with `globset` and scan the key space,
//! which matches the `SCAN` + `DEL` behavior of networked caches.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use globset::GlobBuilder;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Thread-safe in-memory [`CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including not-yet-purged expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if a live entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    /// Lists live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drops every expired entry. Returns the number dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let expired = e.is_expired(now);
            removed += usize::from(expired);
            !expired
        });
        removed
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> CacheResult<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| CacheError::invalid_pattern(pattern, e.to_string()))?
            .compile_matcher();

        let mut removed = 0u64;
        self.entries.retain(|key, _| {
            let matched = matcher.is_match(key);
            removed += u64::from(matched);
            !matched
        });

        debug!(pattern, removed, "Deleted cache keys by pattern");
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache
            .set("user:id:1", json!({"name": "Ann"}), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get("user:id:1").await.unwrap(),
            Some(json!({"name": "Ann"}))
        );

        cache.delete("user:id:1").await.unwrap();
        assert_eq!(cache.get("user:id:1").await.unwrap(), None);
        cache.delete("user:id:1").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entries_read_as_absent() {
        let cache = MemoryCache::new();
        cache
            .set("k", json!(1), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_pattern_targets_prefix() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        for key in [
            "user:permissions:1",
            "user:permissions:2",
            "user:id:1",
            "role:permissions:r1",
            "roles:all",
        ] {
            cache.set(key, json!(true), ttl).await.unwrap();
        }

        let removed = cache.delete_by_pattern("user:permissions:*").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["role:permissions:r1", "roles:all", "user:id:1"]);
    }

    #[tokio::test]
    async fn test_list_pattern_covers_paginated_keys() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("users:all", json!([]), ttl).await.unwrap();
        cache
            .set("users:all:page:2:limit:10", json!([]), ttl)
            .await
            .unwrap();
        assert_eq!(cache.delete_by_pattern("users:all*").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let cache = MemoryCache::new();
        let err = cache.delete_by_pattern("user:[").await.unwrap_err();
        assert_eq!(err.error_type(), "invalid_pattern");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delete_by_pattern_races_writers() {
        let cache = Arc::new(MemoryCache::new());
        let ttl = Duration::from_secs(60);

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..2_000 {
                    cache
                        .set(&format!("user:permissions:{}", i), json!(i), ttl)
                        .await
                        .unwrap();
                    if i % 64 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let mut removed = 0;
        while !writer.is_finished() {
            removed += cache.delete_by_pattern("user:permissions:*").await.unwrap();
            cache.purge_expired();
        }
        writer.await.unwrap();

        // each key is counted once, by the sweep that removed it
        assert_eq!(removed + cache.len() as u64, 2_000);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("a", json!(1), Duration::ZERO).await.unwrap();
        cache.set("b", json!(2), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.contains_key("b"));
    }
}
