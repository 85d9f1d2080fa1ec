// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Effective permission aggregation.
//!
//! ```text
//! effective = role permissions ∪ user overrides
//! ```
//!
//! Overrides are additive only. Nothing here caches; callers that cache the
//! result key it per user and rely on the invalidation coordinator.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::CoreResult;
use crate::model::{User, UserProfile};
use crate::resolver::{resolve_many, resolve_memoized, RolePermissionMemo, RolePermissionSource};
use crate::types::{PermissionSet, RoleId};

/// A user together with its resolved permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedUser {
    /// Public projection of the user.
    pub user: UserProfile,
    /// Name of the user's role.
    pub role_name: String,
    /// Codes granted by the role.
    pub role_permissions: PermissionSet,
    /// Codes stored on the user.
    pub custom_permissions: PermissionSet,
    /// Union of the two.
    pub effective_permissions: PermissionSet,
}

impl EnrichedUser {
    /// Returns `true` if the user may exercise `code`.
    pub fn has_permission(&self, code: &str) -> bool {
        self.effective_permissions.contains(code)
    }
}

fn role_id_of(user: &User) -> CoreResult<RoleId> {
    user.role_id().inspect_err(|_| {
        error!(user_id = %user.id, "User record is missing role reference");
    })
}

/// Attaches role, custom and effective permissions to one user.
///
/// A missing or malformed role reference is a fatal data-integrity error.
pub async fn attach_effective_permissions(
    source: &dyn RolePermissionSource,
    user: &User,
    memo: &mut RolePermissionMemo,
) -> CoreResult<EnrichedUser> {
    let role_id = role_id_of(user)?;
    let role = resolve_memoized(source, &role_id, memo).await?;
    let custom = user.custom_permissions();
    let effective = role.permissions.union(&custom);

    Ok(EnrichedUser {
        user: UserProfile::from_user(user)?,
        role_name: role.role_name,
        role_permissions: role.permissions,
        custom_permissions: custom,
        effective_permissions: effective,
    })
}

/// Enriches a list of users, resolving each distinct role once.
pub async fn attach_effective_permissions_many(
    source: &dyn RolePermissionSource,
    users: &[User],
    memo: &mut RolePermissionMemo,
) -> CoreResult<Vec<EnrichedUser>> {
    let role_ids = users.iter().map(role_id_of).collect::<CoreResult<Vec<_>>>()?;
    resolve_many(source, &role_ids, memo).await?;

    let mut enriched = Vec::with_capacity(users.len());
    for user in users {
        enriched.push(attach_effective_permissions(source, user, memo).await?);
    }
    Ok(enriched)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::memory::MemoryStore;
    use crate::model::{Permission, Role, RolePermission};
    use crate::resolver::{PermissionResolver, RolePermissions};
    use crate::store::AuthStore;
    use crate::types::PermissionCode;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        inner: PermissionResolver,
        single_calls: AtomicUsize,
    }

    #[async_trait]
    impl RolePermissionSource for CountingSource {
        async fn role_permissions(&self, role_id: &RoleId) -> CoreResult<RolePermissions> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.role_permissions(role_id).await
        }

        async fn role_permissions_many(
            &self,
            role_ids: &[RoleId],
        ) -> CoreResult<Vec<RolePermissions>> {
            self.inner.role_permissions_many(role_ids).await
        }
    }

    async fn instructor_store() -> (Arc<MemoryStore>, Role) {
        let store = Arc::new(MemoryStore::new());
        let role = store.create_role(Role::new("instructor", "")).await.unwrap();
        for code in ["course:read", "course:write"] {
            let p = store.create_permission(Permission::new(code, "")).await.unwrap();
            store
                .create_role_permission(RolePermission::new(role.id.clone(), p.id))
                .await
                .unwrap();
        }
        (store, role)
    }

    #[tokio::test]
    async fn test_union_of_role_and_custom() {
        let (store, role) = instructor_store().await;
        let resolver = PermissionResolver::new(store);
        let mut user = User::new("U", "u@example.com", "h", role.id.clone());
        user.permissions = vec![PermissionCode::new("report:read"), PermissionCode::new("course:read")];

        let mut memo = RolePermissionMemo::new();
        let enriched = attach_effective_permissions(&resolver, &user, &mut memo)
            .await
            .unwrap();

        assert_eq!(
            enriched.effective_permissions.to_strings(),
            vec!["course:read", "course:write", "report:read"]
        );
        assert_eq!(enriched.custom_permissions.len(), 2);
        assert_eq!(enriched.role_name, "instructor");
    }

    #[tokio::test]
    async fn test_missing_role_reference_is_fatal() {
        let (store, role) = instructor_store().await;
        let resolver = PermissionResolver::new(store);
        let mut user = User::new("U", "u@example.com", "h", role.id);
        user.role = None;

        let err = attach_effective_permissions(&resolver, &user, &mut RolePermissionMemo::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingRoleReference { .. }));
    }

    #[tokio::test]
    async fn test_many_resolves_each_role_once() {
        let (store, role) = instructor_store().await;
        let source = CountingSource {
            inner: PermissionResolver::new(store),
            single_calls: AtomicUsize::new(0),
        };
        let users: Vec<User> = (0..4)
            .map(|i| User::new(format!("U{i}"), format!("u{i}@example.com"), "h", role.id.clone()))
            .collect();

        let mut memo = RolePermissionMemo::new();
        let enriched = attach_effective_permissions_many(&source, &users, &mut memo)
            .await
            .unwrap();

        assert_eq!(enriched.len(), 4);
        assert_eq!(source.single_calls.load(Ordering::SeqCst), 0);
        assert!(enriched.iter().all(|e| e.has_permission("course:write")));
    }
}
