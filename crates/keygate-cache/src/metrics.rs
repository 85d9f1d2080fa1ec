// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Prometheus metrics for the cache layer.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `keygate_cache_lookups_total` | Counter | `outcome` = hit, miss |
//! | `keygate_cache_failures_total` | Counter | `operation`, `error_type` |
//! | `keygate_cache_invalidations_total` | Counter | `scope` = key, pattern |
//!
//! Metrics register into a caller-supplied [`Registry`] so tests and
//! multiple instances never collide on the global default registry.

use prometheus::{IntCounterVec, Opts, Registry};

/// Cache metric handles.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    lookups: IntCounterVec,
    failures: IntCounterVec,
    invalidations: IntCounterVec,
}

impl CacheMetrics {
    /// Creates the metrics and registers them.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let lookups = IntCounterVec::new(
            Opts::new("keygate_cache_lookups_total", "Cache lookups by outcome"),
            &["outcome"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new(
                "keygate_cache_failures_total",
                "Cache operations that failed open",
            ),
            &["operation", "error_type"],
        )?;
        let invalidations = IntCounterVec::new(
            Opts::new("keygate_cache_invalidations_total", "Cache evictions issued"),
            &["scope"],
        )?;

        registry.register(Box::new(lookups.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(invalidations.clone()))?;

        Ok(Self {
            lookups,
            failures,
            invalidations,
        })
    }

    /// Records a hit.
    pub fn record_hit(&self) {
        self.lookups.with_label_values(&["hit"]).inc();
    }

    /// Records a miss.
    pub fn record_miss(&self) {
        self.lookups.with_label_values(&["miss"]).inc();
    }

    /// Records a failed-open operation.
    pub fn record_failure(&self, operation: &str, error_type: &str) {
        self.failures
            .with_label_values(&[operation, error_type])
            .inc();
    }

    /// Records an eviction.
    pub fn record_invalidation(&self, pattern: bool) {
        let scope = if pattern { "pattern" } else { "key" };
        self.invalidations.with_label_values(&[scope]).inc();
    }

    /// Current hit count.
    pub fn hits(&self) -> u64 {
        self.lookups.with_label_values(&["hit"]).get()
    }

    /// Current miss count.
    pub fn misses(&self) -> u64 {
        self.lookups.with_label_values(&["miss"]).get()
    }

    /// Current failure count for an operation, across error types.
    pub fn failures(&self, operation: &str) -> u64 {
        ["unavailable", "timeout", "serialization", "invalid_pattern"]
            .iter()
            .map(|t| self.failures.with_label_values(&[operation, *t]).get())
            .sum()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let registry = Registry::new();
        let metrics = CacheMetrics::register(&registry).unwrap();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_failure("get", "timeout");
        metrics.record_invalidation(true);

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.failures("get"), 1);
        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        CacheMetrics::register(&registry).unwrap();
        assert!(CacheMetrics::register(&registry).is_err());
    }
}
