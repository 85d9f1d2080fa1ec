// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # keygate-cache
//!
//! Cache-aside acceleration for keygate.
//!
//! - [`CacheStore`]: backend contract (get / set with TTL / delete / glob delete)
//! - [`MemoryCache`]: in-process backend
//! - [`CacheGuard`]: fail-open wrapper with per-call deadlines
//! - [`CacheKeys`]: the namespaced key space
//! - [`InvalidationCoordinator`]: named evictions run after every mutation

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod guard;
pub mod invalidation;
pub mod keys;
pub mod memory;
pub mod metrics;
pub mod traits;

pub use error::{CacheError, CacheResult};
pub use guard::CacheGuard;
pub use invalidation::InvalidationCoordinator;
pub use keys::{CacheKeys, ROLE_PERMISSIONS_PATTERN, USER_LIST_PATTERN, USER_PERMISSIONS_PATTERN};
pub use memory::MemoryCache;
pub use metrics::CacheMetrics;
pub use traits::{CacheConfig, CacheConfigBuilder, CacheStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
