// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cache invalidation coordinator.
//!
//! Mutations write the durable store first and then await one of these
//! operations before reporting success. Single keys are evicted where the
//! affected key is known; patterns are used where the affected set depends on
//! which users hold a role.
//!
//! Every operation is idempotent and fails open through [`CacheGuard`].
//! Sessions are not evicted here: they live on the session store and are
//! ended through the session manager, which reports store failures.

use tracing::debug;

use keygate_core::{RoleId, UserId};

use crate::guard::CacheGuard;
use crate::keys::{
    CacheKeys, ROLE_PERMISSIONS_PATTERN, USER_LIST_PATTERN, USER_PERMISSIONS_PATTERN,
};

/// Named eviction operations over the keygate key space.
#[derive(Debug, Clone)]
pub struct InvalidationCoordinator {
    cache: CacheGuard,
}

impl InvalidationCoordinator {
    /// Creates a coordinator over a guarded cache.
    pub fn new(cache: CacheGuard) -> Self {
        Self { cache }
    }

    /// Evicts a user's profile, permission snapshot and every listing.
    pub async fn invalidate_user(&self, user_id: &UserId) {
        let profile = CacheKeys::user(user_id);
        let permissions = CacheKeys::user_permissions(user_id);
        tokio::join!(
            self.cache.delete(&profile),
            self.cache.delete(&permissions),
            self.cache.delete_by_pattern(USER_LIST_PATTERN),
        );
        debug!(%user_id, "Invalidated user caches");
    }

    /// Evicts the user listings.
    pub async fn invalidate_user_list(&self) {
        self.cache.delete_by_pattern(USER_LIST_PATTERN).await;
        debug!("Invalidated user list caches");
    }

    /// Evicts one role's permission set and the roles listing.
    pub async fn invalidate_role_permissions(&self, role_id: &RoleId) {
        let role_key = CacheKeys::role_permissions(role_id);
        let roles_key = CacheKeys::roles_all();
        tokio::join!(self.cache.delete(&role_key), self.cache.delete(&roles_key));
        debug!(%role_id, "Invalidated role permission caches");
    }

    /// Evicts every role permission set and the roles listing.
    pub async fn invalidate_all_roles(&self) {
        self.cache.delete_by_pattern(ROLE_PERMISSIONS_PATTERN).await;
        self.cache.delete(&CacheKeys::roles_all()).await;
        debug!("Invalidated all role caches");
    }

    /// Evicts every per-user permission snapshot.
    pub async fn invalidate_all_user_permissions(&self) {
        self.cache.delete_by_pattern(USER_PERMISSIONS_PATTERN).await;
        debug!("Invalidated all user permission caches");
    }

    /// Evicts a role's permission set and every user snapshot that may
    /// embed it.
    pub async fn invalidate_users_with_role(&self, role_id: &RoleId) {
        self.cache.delete(&CacheKeys::role_permissions(role_id)).await;
        self.cache.delete_by_pattern(USER_PERMISSIONS_PATTERN).await;
        debug!(%role_id, "Invalidated caches of users holding role");
    }

    /// Evicts every snapshot derived from user role assignments: the
    /// per-user permission sets and the enriched listings.
    pub async fn invalidate_role_assignments(&self) {
        tokio::join!(
            self.cache.delete_by_pattern(USER_PERMISSIONS_PATTERN),
            self.cache.delete_by_pattern(USER_LIST_PATTERN),
        );
        debug!("Invalidated role assignment caches");
    }

    /// Full fan-out after a role-permission mapping change.
    ///
    /// Listings embed effective permissions, so they are evicted with the
    /// per-user snapshots.
    pub async fn invalidate_role_mapping_change(&self, role_id: &RoleId) {
        self.invalidate_role_permissions(role_id).await;
        self.invalidate_all_roles().await;
        self.invalidate_users_with_role(role_id).await;
        self.invalidate_user_list().await;
    }
}

// =============================================================================
// Tests
// =============================================================================
