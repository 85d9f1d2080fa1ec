// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Durable store contract.
//!
//! The store is the source of truth for roles, permissions, their mappings and
//! users. Any engine that supports indexed lookups can implement
//! [`AuthStore`]; [`crate::memory::MemoryStore`] is the in-process reference
//! implementation.
//!
//! Errors from the store are fatal to the calling operation. Nothing in the
//! core retries or masks them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::model::{Permission, Role, RolePermission, RoleWithPermissions, User};
use crate::types::{PermissionCode, PermissionId, RoleId, UserId};

// =============================================================================
// Queries
// =============================================================================

/// Default page size for user listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Filter and pagination for user listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Restrict to one role.
    #[serde(default)]
    pub role_id: Option<RoleId>,
    /// Case-insensitive substring over name and email.
    #[serde(default)]
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            role_id: None,
            search: None,
        }
    }
}

impl UserQuery {
    /// Creates a query for one page.
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    /// Restricts the query to a role.
    pub fn with_role(mut self, role_id: RoleId) -> Self {
        self.role_id = Some(role_id);
        self
    }

    /// Adds a search term.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Clamps page and limit into their accepted ranges.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_LIMIT);
        self.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// Number of records to skip.
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit as usize
    }
}

/// One page of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPage {
    /// Users on this page.
    pub users: Vec<User>,
    /// Total matching users.
    pub total: u64,
}

// =============================================================================
// AuthStore
// =============================================================================

/// Durable collections behind the authorization core.
#[async_trait]
pub trait AuthStore: Send + Sync {
    // ---- roles -------------------------------------------------------------

    /// Finds a role by identifier.
    async fn find_role(&self, id: &RoleId) -> CoreResult<Option<Role>>;

    /// Finds a role by its unique name.
    async fn find_role_by_name(&self, name: &str) -> CoreResult<Option<Role>>;

    /// Finds several roles at once. Unknown identifiers are skipped.
    async fn find_roles(&self, ids: &[RoleId]) -> CoreResult<Vec<Role>>;

    /// Lists every role.
    async fn list_roles(&self) -> CoreResult<Vec<Role>>;

    /// Inserts a role. Fails with `Conflict` on a duplicate name.
    async fn create_role(&self, role: Role) -> CoreResult<Role>;

    /// Replaces a role. Fails with `NotFound` if absent.
    async fn update_role(&self, role: Role) -> CoreResult<Role>;

    // ---- permissions -------------------------------------------------------

    /// Finds a permission by code.
    async fn find_permission_by_code(
        &self,
        code: &PermissionCode,
    ) -> CoreResult<Option<Permission>>;

    /// Finds permissions by identifier. Unknown identifiers are skipped.
    async fn find_permissions(&self, ids: &[PermissionId]) -> CoreResult<Vec<Permission>>;

    /// Finds permissions by code. Unknown codes are skipped.
    async fn find_permissions_by_codes(
        &self,
        codes: &[PermissionCode],
    ) -> CoreResult<Vec<Permission>>;

    /// Lists every permission.
    async fn list_permissions(&self) -> CoreResult<Vec<Permission>>;

    /// Inserts a permission. Fails with `Conflict` on a duplicate code.
    async fn create_permission(&self, permission: Permission) -> CoreResult<Permission>;

    // ---- role permissions --------------------------------------------------

    /// Finds mapping rows for the given roles.
    async fn find_role_permissions(&self, role_ids: &[RoleId]) -> CoreResult<Vec<RolePermission>>;

    /// Inserts a mapping row. Fails with `Conflict` if the pair exists.
    async fn create_role_permission(&self, mapping: RolePermission) -> CoreResult<RolePermission>;

    /// Deletes the mapping for a pair. Returns `false` if none existed.
    async fn delete_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> CoreResult<bool>;

    /// Lookup-and-group projection of every role with its permissions.
    async fn roles_with_permissions(&self) -> CoreResult<Vec<RoleWithPermissions>>;

    // ---- users -------------------------------------------------------------

    /// Finds a user by identifier.
    async fn find_user(&self, id: &UserId) -> CoreResult<Option<User>>;

    /// Finds a user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    /// Lists users page by page, newest first.
    async fn find_users(&self, query: &UserQuery) -> CoreResult<UserPage>;

    /// Inserts a user. Fails with `Conflict` on a duplicate email.
    async fn create_user(&self, user: User) -> CoreResult<User>;

    /// Replaces a user. Fails with `NotFound` if absent.
    async fn update_user(&self, user: User) -> CoreResult<User>;

    /// Deletes a user. Returns `false` if none existed.
    async fn delete_user(&self, id: &UserId) -> CoreResult<bool>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_offset() {
        assert_eq!(UserQuery::page(1, 10).offset(), 0);
        assert_eq!(UserQuery::page(3, 20).offset(), 40);
        assert_eq!(UserQuery::page(0, 20).offset(), 0);
    }

    #[test]
    fn test_query_normalized() {
        let q = UserQuery::page(0, 1000).with_search("   ").normalized();
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, MAX_PAGE_LIMIT);
        assert!(q.search.is_none());
    }

    #[test]
    fn test_query_defaults_from_json() {
        let q: UserQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q, UserQuery::default());
    }
}
