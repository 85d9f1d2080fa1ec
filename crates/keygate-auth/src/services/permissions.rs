// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cache-aside permission lookups.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use keygate_cache::{CacheGuard, CacheKeys};
use keygate_core::{
    attach_effective_permissions, attach_effective_permissions_many, AuthStore, CoreError,
    CoreResult, EnrichedUser, PermissionResolver, RoleId, RolePermissionMemo,
    RolePermissionSource, RolePermissions, User, UserId,
};

use crate::error::ApiResult;

// =============================================================================
// CachedRoleResolver
// =============================================================================

/// Role permission lookups through `role:permissions:{id}`.
#[derive(Debug, Clone)]
pub struct CachedRoleResolver {
    inner: PermissionResolver,
    cache: CacheGuard,
    ttl: Duration,
}

impl CachedRoleResolver {
    /// Wraps a store-backed resolver.
    pub fn new(inner: PermissionResolver, cache: CacheGuard, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl RolePermissionSource for CachedRoleResolver {
    async fn role_permissions(&self, role_id: &RoleId) -> CoreResult<RolePermissions> {
        self.cache
            .get_or_load(&CacheKeys::role_permissions(role_id), self.ttl, || {
                self.inner.resolve_role_permissions(role_id)
            })
            .await
    }

    async fn role_permissions_many(&self, role_ids: &[RoleId]) -> CoreResult<Vec<RolePermissions>> {
        let mut resolved = Vec::with_capacity(role_ids.len());
        let mut missing = Vec::new();

        for role_id in role_ids {
            match self
                .cache
                .get_json::<RolePermissions>(&CacheKeys::role_permissions(role_id))
                .await
            {
                Some(hit) => resolved.push(hit),
                None => missing.push(role_id.clone()),
            }
        }

        if !missing.is_empty() {
            debug!(hits = resolved.len(), misses = missing.len(), "Loading role permissions");
            for loaded in self.inner.role_permissions_many(&missing).await? {
                self.cache
                    .set_json(&CacheKeys::role_permissions(&loaded.role_id), &loaded, self.ttl)
                    .await;
                resolved.push(loaded);
            }
        }
        Ok(resolved)
    }
}

// =============================================================================
// EffectivePermissionService
// =============================================================================

/// Effective permissions per user, cached under `user:permissions:{id}`.
#[derive(Clone)]
pub struct EffectivePermissionService {
    store: Arc<dyn AuthStore>,
    roles: Arc<dyn RolePermissionSource>,
    cache: CacheGuard,
    ttl: Duration,
}

impl std::fmt::Debug for EffectivePermissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectivePermissionService")
            .field("cache", &self.cache)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl EffectivePermissionService {
    /// Creates the service.
    pub fn new(
        store: Arc<dyn AuthStore>,
        roles: Arc<dyn RolePermissionSource>,
        cache: CacheGuard,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            roles,
            cache,
            ttl,
        }
    }

    /// The role permission source used for enrichment.
    pub fn role_source(&self) -> Arc<dyn RolePermissionSource> {
        self.roles.clone()
    }

    /// Loads a user by id and returns it with effective permissions.
    pub async fn for_user_id(&self, user_id: &UserId) -> ApiResult<EnrichedUser> {
        let enriched = self
            .cache
            .get_or_load(&CacheKeys::user_permissions(user_id), self.ttl, || async {
                let user = self
                    .store
                    .find_user(user_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("user", user_id.as_str()))?;
                let mut memo = RolePermissionMemo::new();
                attach_effective_permissions(self.roles.as_ref(), &user, &mut memo).await
            })
            .await?;
        Ok(enriched)
    }

    /// Returns an already loaded user with effective permissions.
    pub async fn for_user(&self, user: &User) -> ApiResult<EnrichedUser> {
        let key = CacheKeys::user_permissions(&user.id);
        let enriched = self
            .cache
            .get_or_load(&key, self.ttl, || async {
                let mut memo = RolePermissionMemo::new();
                attach_effective_permissions(self.roles.as_ref(), user, &mut memo).await
            })
            .await?;
        Ok(enriched)
    }

    /// Enriches a page of users, resolving each distinct role once.
    pub async fn for_users(&self, users: &[User]) -> ApiResult<Vec<EnrichedUser>> {
        let mut memo = RolePermissionMemo::new();
        Ok(attach_effective_permissions_many(self.roles.as_ref(), users, &mut memo).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
