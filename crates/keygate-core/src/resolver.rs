// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Role → permission resolution.
//!
//! [`PermissionResolver`] walks role → role-permission rows → permissions and
//! projects the codes. List endpoints resolve many roles at once through
//! [`RolePermissionSource::role_permissions_many`], which issues one query per
//! collection instead of one per user.
//!
//! [`RolePermissionMemo`] is a per-call map. Create one per request or list
//! operation and drop it afterwards; never share it across requests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::store::AuthStore;
use crate::types::{PermissionId, PermissionSet, RoleId};

// =============================================================================
// RolePermissions
// =============================================================================

/// Permission codes granted by one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissions {
    /// The role.
    pub role_id: RoleId,
    /// Role name.
    pub role_name: String,
    /// Granted codes. Empty when the role has no mappings.
    pub permissions: PermissionSet,
}

// =============================================================================
// RolePermissionMemo
// =============================================================================

/// Short-lived role → permissions map for one request or list operation.
#[derive(Debug, Default)]
pub struct RolePermissionMemo {
    entries: HashMap<RoleId, RolePermissions>,
}

impl RolePermissionMemo {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a memoized role.
    pub fn get(&self, role_id: &RoleId) -> Option<&RolePermissions> {
        self.entries.get(role_id)
    }

    /// Records a resolved role.
    pub fn insert(&mut self, resolved: RolePermissions) {
        self.entries.insert(resolved.role_id.clone(), resolved);
    }

    /// Returns `true` if the role is memoized.
    pub fn contains(&self, role_id: &RoleId) -> bool {
        self.entries.contains_key(role_id)
    }

    /// Number of memoized roles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// RolePermissionSource
// =============================================================================

/// Anything that can answer "which codes does this role grant".
#[async_trait]
pub trait RolePermissionSource: Send + Sync {
    /// Resolves one role. Unknown roles fail with `RoleNotFound`.
    async fn role_permissions(&self, role_id: &RoleId) -> CoreResult<RolePermissions>;

    /// Resolves several roles. The default resolves them one by one.
    async fn role_permissions_many(
        &self,
        role_ids: &[RoleId],
    ) -> CoreResult<Vec<RolePermissions>> {
        let mut resolved = Vec::with_capacity(role_ids.len());
        for role_id in role_ids {
            resolved.push(self.role_permissions(role_id).await?);
        }
        Ok(resolved)
    }
}

/// Resolves a role through the memo, falling back to `source`.
pub async fn resolve_memoized(
    source: &dyn RolePermissionSource,
    role_id: &RoleId,
    memo: &mut RolePermissionMemo,
) -> CoreResult<RolePermissions> {
    if let Some(hit) = memo.get(role_id) {
        return Ok(hit.clone());
    }
    let resolved = source.role_permissions(role_id).await?;
    memo.insert(resolved.clone());
    Ok(resolved)
}

/// Resolves every distinct role in `role_ids` not yet memoized, in one batch.
pub async fn resolve_many(
    source: &dyn RolePermissionSource,
    role_ids: &[RoleId],
    memo: &mut RolePermissionMemo,
) -> CoreResult<()> {
    let mut seen = HashSet::new();
    let missing: Vec<RoleId> = role_ids
        .iter()
        .filter(|id| !memo.contains(id) && seen.insert((*id).clone()))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    for resolved in source.role_permissions_many(&missing).await? {
        memo.insert(resolved);
    }
    Ok(())
}

// =============================================================================
// PermissionResolver
// =============================================================================

/// Resolves role permissions straight from the durable store.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn AuthStore>,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver").finish_non_exhaustive()
    }
}

impl PermissionResolver {
    /// Creates a resolver over a store.
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Resolves a single role.
    pub async fn resolve_role_permissions(&self, role_id: &RoleId) -> CoreResult<RolePermissions> {
        let role = self
            .store
            .find_role(role_id)
            .await?
            .ok_or_else(|| CoreError::role_not_found(role_id.clone()))?;

        let mappings = self
            .store
            .find_role_permissions(std::slice::from_ref(role_id))
            .await?;
        let ids: Vec<PermissionId> = mappings.into_iter().map(|m| m.permission_id).collect();

        let permissions: PermissionSet = if ids.is_empty() {
            PermissionSet::new()
        } else {
            self.store
                .find_permissions(&ids)
                .await?
                .into_iter()
                .map(|p| p.code)
                .collect()
        };

        debug!(role_id = %role_id, count = permissions.len(), "Resolved role permissions");
        Ok(RolePermissions {
            role_id: role.id,
            role_name: role.name,
            permissions,
        })
    }
}

#[async_trait]
impl RolePermissionSource for PermissionResolver {
    async fn role_permissions(&self, role_id: &RoleId) -> CoreResult<RolePermissions> {
        self.resolve_role_permissions(role_id).await
    }

    async fn role_permissions_many(
        &self,
        role_ids: &[RoleId],
    ) -> CoreResult<Vec<RolePermissions>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let roles = self.store.find_roles(role_ids).await?;
        if let Some(missing) = role_ids
            .iter()
            .find(|id| !roles.iter().any(|r| &r.id == *id))
        {
            return Err(CoreError::role_not_found(missing.clone()));
        }

        let mappings = self.store.find_role_permissions(role_ids).await?;
        let mut permission_ids: Vec<PermissionId> =
            mappings.iter().map(|m| m.permission_id.clone()).collect();
        permission_ids.sort();
        permission_ids.dedup();

        let permissions = if permission_ids.is_empty() {
            Vec::new()
        } else {
            self.store.find_permissions(&permission_ids).await?
        };
        let code_by_id: HashMap<&PermissionId, _> =
            permissions.iter().map(|p| (&p.id, &p.code)).collect();

        let resolved = roles
            .into_iter()
            .map(|role| {
                let codes: PermissionSet = mappings
                    .iter()
                    .filter(|m| m.role_id == role.id)
                    .filter_map(|m| code_by_id.get(&m.permission_id).map(|c| (*c).clone()))
                    .collect();
                RolePermissions {
                    role_id: role.id,
                    role_name: role.name,
                    permissions: codes,
                }
            })
            .collect::<Vec<_>>();

        debug!(roles = resolved.len(), "Resolved role permissions in batch");
        Ok(resolved)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::{Permission, Role, RolePermission};

    async fn seeded() -> (Arc<MemoryStore>, Role, Role) {
        let store = Arc::new(MemoryStore::new());
        let instructor = store.create_role(Role::new("instructor", "")).await.unwrap();
        let guest = store.create_role(Role::new("guest", "")).await.unwrap();
        for code in ["course:read", "course:write"] {
            let p = store.create_permission(Permission::new(code, "")).await.unwrap();
            store
                .create_role_permission(RolePermission::new(instructor.id.clone(), p.id))
                .await
                .unwrap();
        }
        (store, instructor, guest)
    }

    #[tokio::test]
    async fn test_resolve_role_permissions() {
        let (store, instructor, _) = seeded().await;
        let resolver = PermissionResolver::new(store);
        let resolved = resolver
            .resolve_role_permissions(&instructor.id)
            .await
            .unwrap();
        assert_eq!(resolved.role_name, "instructor");
        assert_eq!(resolved.permissions.to_strings(), vec!["course:read", "course:write"]);
    }

    #[tokio::test]
    async fn test_role_without_permissions_is_empty() {
        let (store, _, guest) = seeded().await;
        let resolver = PermissionResolver::new(store);
        let resolved = resolver.resolve_role_permissions(&guest.id).await.unwrap();
        assert!(resolved.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_role_is_distinct_error() {
        let (store, _, _) = seeded().await;
        let resolver = PermissionResolver::new(store);
        let err = resolver
            .resolve_role_permissions(&RoleId::new("nope"))
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::role_not_found(RoleId::new("nope")));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let (store, instructor, guest) = seeded().await;
        let resolver = PermissionResolver::new(store);
        let batch = resolver
            .role_permissions_many(&[instructor.id.clone(), guest.id.clone()])
            .await
            .unwrap();
        let single = resolver
            .resolve_role_permissions(&instructor.id)
            .await
            .unwrap();
        let from_batch = batch.iter().find(|r| r.role_id == instructor.id).unwrap();
        assert_eq!(from_batch, &single);
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_unknown_role() {
        let (store, instructor, _) = seeded().await;
        let resolver = PermissionResolver::new(store);
        let err = resolver
            .role_permissions_many(&[instructor.id, RoleId::new("ghost")])
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "role_not_found");
    }

    #[tokio::test]
    async fn test_resolve_many_dedups() {
        let (store, instructor, guest) = seeded().await;
        let resolver = PermissionResolver::new(store);
        let mut memo = RolePermissionMemo::new();
        resolve_many(
            &resolver,
            &[instructor.id.clone(), instructor.id.clone(), guest.id.clone()],
            &mut memo,
        )
        .await
        .unwrap();
        assert_eq!(memo.len(), 2);

        let hit = resolve_memoized(&resolver, &guest.id, &mut memo).await.unwrap();
        assert_eq!(hit.role_name, "guest");
    }
}
