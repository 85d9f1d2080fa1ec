// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Account, user and role services.
//!
//! Every service shares one [`ServiceContext`]: the durable store, the guarded
//! cache, the invalidation fan-out and the effective permission lookups.
//! Mutations always write the store first and invalidate afterwards.

mod auth;
mod permissions;
mod roles;
mod users;

use std::sync::Arc;

use tracing::{debug, warn};

use keygate_cache::{CacheConfig, CacheGuard, InvalidationCoordinator};
use keygate_core::{
    AuthStore, EmailJob, JobEnvelope, PermissionResolver, RetryPolicy, RolePermissionSource,
    TaskDispatcher,
};

pub use auth::{
    AuthService, ChangePasswordRequest, Credentials, CurrentUser, LoginRequest, LoginResponse,
    RefreshResponse, RegisterOutcome, RegisterRequest, ResetPasswordRequest,
};
pub use permissions::{CachedRoleResolver, EffectivePermissionService};
pub use roles::{CreatePermissionRequest, CreateRoleRequest, RoleAdminService};
pub use users::{UpdateUserRequest, UserAdminService, UserListPage};

// =============================================================================
// ServiceContext
// =============================================================================

/// Shared collaborators of every service.
#[derive(Clone)]
pub struct ServiceContext {
    /// Durable store.
    pub store: Arc<dyn AuthStore>,
    /// Fail-open cache.
    pub cache: CacheGuard,
    /// Cache TTLs.
    pub ttls: CacheConfig,
    /// Invalidation fan-out.
    pub invalidation: InvalidationCoordinator,
    /// Effective permission lookups.
    pub permissions: EffectivePermissionService,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("cache", &self.cache)
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl ServiceContext {
    /// Wires the cached permission resolver over `store`.
    pub fn new(store: Arc<dyn AuthStore>, cache: CacheGuard, ttls: CacheConfig) -> Self {
        let roles: Arc<dyn RolePermissionSource> = Arc::new(CachedRoleResolver::new(
            PermissionResolver::new(store.clone()),
            cache.clone(),
            ttls.roles_ttl,
        ));
        let permissions =
            EffectivePermissionService::new(store.clone(), roles, cache.clone(), ttls.permissions_ttl);

        Self {
            invalidation: InvalidationCoordinator::new(cache.clone()),
            store,
            cache,
            ttls,
            permissions,
        }
    }

    /// Live role permission source, shared with the [`Authorizer`](crate::auth::Authorizer).
    pub fn role_source(&self) -> Arc<dyn RolePermissionSource> {
        self.permissions.role_source()
    }
}

// =============================================================================
// Mailer
// =============================================================================

/// Fire-and-forget email submission.
#[derive(Clone)]
pub struct Mailer {
    dispatcher: Arc<dyn TaskDispatcher>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer").field("retry", &self.retry).finish_non_exhaustive()
    }
}

impl Mailer {
    /// Creates a mailer submitting to `dispatcher`.
    pub fn new(dispatcher: Arc<dyn TaskDispatcher>, retry: RetryPolicy) -> Self {
        Self { dispatcher, retry }
    }

    /// Submits a job. Failures are logged and reported as `false`.
    pub async fn send(&self, job: EmailJob) -> bool {
        let name = job.job_name();
        let envelope = match JobEnvelope::email(&job, self.retry) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(job = name, error = %e, "Failed to encode email job");
                return false;
            }
        };

        match self.dispatcher.submit(envelope).await {
            Ok(()) => {
                debug!(job = name, "Email job queued");
                true
            }
            Err(e) => {
                warn!(job = name, error = %e, "Failed to queue email job");
                false
            }
        }
    }
}
