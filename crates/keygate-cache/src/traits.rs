// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cache traits and configuration.
//!
//! The cache holds derived, disposable state. The system stays correct with
//! an empty cache, so backends are free to evict at any time.
//!
//! # Example
//!
//! ```rust,ignore
//! use keygate_cache::{CacheStore, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! cache.set("roles:all", json!([]), Duration::from_secs(60)).await?;
//! cache.delete_by_pattern("role:permissions:*").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

// =============================================================================
// Cache Configuration
// =============================================================================

/// Configuration shared by the cache layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Deadline for every individual cache call.
    #[serde(default = "default_operation_timeout")]
    #[serde(with = "duration_millis")]
    pub operation_timeout: Duration,

    /// TTL of cached user profiles.
    #[serde(default = "default_user_ttl")]
    #[serde(with = "duration_secs")]
    pub user_ttl: Duration,

    /// TTL of cached per-user permission snapshots.
    #[serde(default = "default_permissions_ttl")]
    #[serde(with = "duration_secs")]
    pub permissions_ttl: Duration,

    /// TTL of cached role permission sets and the roles listing.
    #[serde(default = "default_roles_ttl")]
    #[serde(with = "duration_secs")]
    pub roles_ttl: Duration,

    /// TTL of cached user listings.
    #[serde(default = "default_list_ttl")]
    #[serde(with = "duration_secs")]
    pub list_ttl: Duration,

    /// Record Prometheus metrics.
    #[serde(default)]
    pub metrics_enabled: bool,
}

fn default_operation_timeout() -> Duration {
    Duration::from_millis(250)
}

fn default_user_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_permissions_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_roles_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_list_ttl() -> Duration {
    Duration::from_secs(60)
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            operation_timeout: default_operation_timeout(),
            user_ttl: default_user_ttl(),
            permissions_ttl: default_permissions_ttl(),
            roles_ttl: default_roles_ttl(),
            list_ttl: default_list_ttl(),
            metrics_enabled: false,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Configuration for tests: tight timeout, short TTLs.
    pub fn for_testing() -> Self {
        Self {
            operation_timeout: Duration::from_millis(50),
            user_ttl: Duration::from_secs(30),
            permissions_ttl: Duration::from_secs(30),
            roles_ttl: Duration::from_secs(30),
            list_ttl: Duration::from_secs(30),
            metrics_enabled: false,
        }
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Sets the per-call deadline.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Sets the user profile TTL.
    pub fn user_ttl(mut self, ttl: Duration) -> Self {
        self.config.user_ttl = ttl;
        self
    }

    /// Sets the permission snapshot TTL.
    pub fn permissions_ttl(mut self, ttl: Duration) -> Self {
        self.config.permissions_ttl = ttl;
        self
    }

    /// Sets the roles TTL.
    pub fn roles_ttl(mut self, ttl: Duration) -> Self {
        self.config.roles_ttl = ttl;
        self
    }

    /// Sets the list TTL.
    pub fn list_ttl(mut self, ttl: Duration) -> Self {
        self.config.list_ttl = ttl;
        self
    }

    /// Enables metrics.
    pub fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.config.metrics_enabled = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CacheConfig {
        self.config
    }
}

// =============================================================================
// CacheStore
// =============================================================================

/// Key-value cache with TTL and glob eviction.
///
/// Keys are colon-delimited strings; values are JSON snapshots.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads a key. Expired entries read as absent.
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>>;

    /// Writes a key with a TTL, replacing any existing value.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> CacheResult<()>;

    /// Removes a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Removes every key matching a glob (`*`, `?`, `[...]`). Returns the count.
    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str {
        "cache"
    }
}

// =============================================================================
// Tests
// =============================================================================
