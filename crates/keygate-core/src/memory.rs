// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory [`AuthStore`] implementation.
//!
//! Holds every collection behind one `parking_lot::RwLock`, enforces the same
//! uniqueness rules a document store would enforce with unique indexes, and
//! keeps no persistence. Intended for tests, local development and as the
//! reference semantics for real backends.
//!
//! # Example
//!
//! ```rust,ignore
//! use keygate_core::{MemoryStore, AuthStore, Role};
//!
//! let store = MemoryStore::new();
//! let role = store.create_role(Role::new("student", "Learners")).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::model::{normalize_email, Permission, Role, RolePermission, RoleWithPermissions, User};
use crate::store::{AuthStore, UserPage, UserQuery};
use crate::types::{PermissionCode, PermissionId, RoleId, UserId};

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Debug, Default)]
struct Collections {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    role_permissions: Vec<RolePermission>,
    users: HashMap<UserId, User>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }

    /// Number of role-permission mapping rows.
    pub fn mapping_count(&self) -> usize {
        self.inner.read().role_permissions.len()
    }
}

fn matches_query(user: &User, query: &UserQuery) -> bool {
    if let Some(role_id) = &query.role_id {
        match user.role_id() {
            Ok(id) if &id == role_id => {}
            _ => return false,
        }
    }
    if let Some(term) = &query.search {
        let term = term.to_lowercase();
        if !user.name.to_lowercase().contains(&term) && !user.email.contains(&term) {
            return false;
        }
    }
    true
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn find_role(&self, id: &RoleId) -> CoreResult<Option<Role>> {
        Ok(self.inner.read().roles.get(id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> CoreResult<Option<Role>> {
        let inner = self.inner.read();
        Ok(inner.roles.values().find(|r| r.name == name).cloned())
    }

    async fn find_roles(&self, ids: &[RoleId]) -> CoreResult<Vec<Role>> {
        let inner = self.inner.read();
        Ok(ids.iter().filter_map(|id| inner.roles.get(id).cloned()).collect())
    }

    async fn list_roles(&self) -> CoreResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.inner.read().roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(&self, role: Role) -> CoreResult<Role> {
        let mut inner = self.inner.write();
        if inner.roles.values().any(|r| r.name == role.name) {
            return Err(CoreError::conflict(format!("Role '{}' already exists", role.name)));
        }
        inner.roles.insert(role.id.clone(), role.clone());
        debug!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    async fn update_role(&self, role: Role) -> CoreResult<Role> {
        let mut inner = self.inner.write();
        if !inner.roles.contains_key(&role.id) {
            return Err(CoreError::role_not_found(role.id));
        }
        if inner
            .roles
            .values()
            .any(|r| r.name == role.name && r.id != role.id)
        {
            return Err(CoreError::conflict(format!("Role '{}' already exists", role.name)));
        }
        inner.roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn find_permission_by_code(
        &self,
        code: &PermissionCode,
    ) -> CoreResult<Option<Permission>> {
        let inner = self.inner.read();
        Ok(inner.permissions.values().find(|p| &p.code == code).cloned())
    }

    async fn find_permissions(&self, ids: &[PermissionId]) -> CoreResult<Vec<Permission>> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.permissions.get(id).cloned())
            .collect())
    }

    async fn find_permissions_by_codes(
        &self,
        codes: &[PermissionCode],
    ) -> CoreResult<Vec<Permission>> {
        let inner = self.inner.read();
        Ok(inner
            .permissions
            .values()
            .filter(|p| codes.contains(&p.code))
            .cloned()
            .collect())
    }

    async fn list_permissions(&self) -> CoreResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> =
            self.inner.read().permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn create_permission(&self, permission: Permission) -> CoreResult<Permission> {
        let mut inner = self.inner.write();
        if inner.permissions.values().any(|p| p.code == permission.code) {
            return Err(CoreError::conflict(format!(
                "Permission '{}' already exists",
                permission.code
            )));
        }
        inner
            .permissions
            .insert(permission.id.clone(), permission.clone());
        Ok(permission)
    }

    async fn find_role_permissions(&self, role_ids: &[RoleId]) -> CoreResult<Vec<RolePermission>> {
        let inner = self.inner.read();
        Ok(inner
            .role_permissions
            .iter()
            .filter(|rp| role_ids.contains(&rp.role_id))
            .cloned()
            .collect())
    }

    async fn create_role_permission(&self, mapping: RolePermission) -> CoreResult<RolePermission> {
        let mut inner = self.inner.write();
        if inner
            .role_permissions
            .iter()
            .any(|rp| rp.role_id == mapping.role_id && rp.permission_id == mapping.permission_id)
        {
            return Err(CoreError::conflict("Permission already granted to role"));
        }
        inner.role_permissions.push(mapping.clone());
        Ok(mapping)
    }

    async fn delete_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> CoreResult<bool> {
        let mut inner = self.inner.write();
        let before = inner.role_permissions.len();
        inner
            .role_permissions
            .retain(|rp| !(&rp.role_id == role_id && &rp.permission_id == permission_id));
        Ok(inner.role_permissions.len() != before)
    }

    async fn roles_with_permissions(&self) -> CoreResult<Vec<RoleWithPermissions>> {
        let inner = self.inner.read();
        let mut grouped: Vec<RoleWithPermissions> = inner
            .roles
            .values()
            .map(|role| {
                let mut permissions: Vec<Permission> = inner
                    .role_permissions
                    .iter()
                    .filter(|rp| rp.role_id == role.id)
                    .filter_map(|rp| inner.permissions.get(&rp.permission_id).cloned())
                    .collect();
                permissions.sort_by(|a, b| a.code.cmp(&b.code));
                RoleWithPermissions {
                    role: role.clone(),
                    permissions,
                }
            })
            .collect();
        grouped.sort_by(|a, b| a.role.name.cmp(&b.role.name));
        Ok(grouped)
    }

    async fn find_user(&self, id: &UserId) -> CoreResult<Option<User>> {
        Ok(self.inner.read().users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let email = normalize_email(email);
        let inner = self.inner.read();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, query: &UserQuery) -> CoreResult<UserPage> {
        let inner = self.inner.read();
        let mut matching: Vec<&User> = inner
            .users
            .values()
            .filter(|u| matches_query(u, query))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let users = matching
            .into_iter()
            .skip(query.offset())
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(UserPage { users, total })
    }

    async fn create_user(&self, mut user: User) -> CoreResult<User> {
        user.email = normalize_email(&user.email);
        let mut inner = self.inner.write();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(CoreError::conflict(format!(
                "User with email '{}' already exists",
                user.email
            )));
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: User) -> CoreResult<User> {
        let mut inner = self.inner.write();
        match inner.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(user)
            }
            None => Err(CoreError::not_found("user", user.id.as_str())),
        }
    }

    async fn delete_user(&self, id: &UserId) -> CoreResult<bool> {
        Ok(self.inner.write().users.remove(id).is_some())
    }
}

// =============================================================================
// Tests
// =============================================================================
