// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cache key namespace.
//!
//! | Key | Holds |
//! |-----|-------|
//! | `user:id:{id}` | user profile |
//! | `user:activity:{id}` | last-seen marker |
//! | `user:permissions:{id}` | enriched user with effective permissions |
//! | `users:all[:page:{p}:limit:{l}[:role:{r}][:search:{s}]]` | user listings |
//! | `session:user:{id}` | the user's single session |
//! | `role:permissions:{id}` | role permission set |
//! | `roles:all` | roles with their permissions |
//!
//! Each category has its own prefix so a single glob evicts all of it.

use keygate_core::{RoleId, UserId, UserQuery};

/// Glob matching every per-user permission snapshot.
pub const USER_PERMISSIONS_PATTERN: &str = "user:permissions:*";

/// Glob matching every role permission set.
pub const ROLE_PERMISSIONS_PATTERN: &str = "role:permissions:*";

/// Glob matching the user listing and all of its pages.
pub const USER_LIST_PATTERN: &str = "users:all*";

/// Deterministic cache key builders.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    /// `user:id:{id}`
    pub fn user(id: &UserId) -> String {
        format!("user:id:{id}")
    }

    /// `user:activity:{id}`
    pub fn user_activity(id: &UserId) -> String {
        format!("user:activity:{id}")
    }

    /// `user:permissions:{id}`
    pub fn user_permissions(id: &UserId) -> String {
        format!("user:permissions:{id}")
    }

    /// `users:all`
    pub fn users_all() -> String {
        "users:all".to_string()
    }

    /// Listing key for one page of a query.
    pub fn users_page(query: &UserQuery) -> String {
        let mut key = format!("users:all:page:{}:limit:{}", query.page, query.limit);
        if let Some(role_id) = &query.role_id {
            key.push_str(":role:");
            key.push_str(role_id.as_str());
        }
        if let Some(search) = &query.search {
            key.push_str(":search:");
            key.push_str(&search.to_lowercase());
        }
        key
    }

    /// `session:user:{id}`
    pub fn session(user_id: &UserId) -> String {
        format!("session:user:{user_id}")
    }

    /// `role:permissions:{id}`
    pub fn role_permissions(role_id: &RoleId) -> String {
        format!("role:permissions:{role_id}")
    }

    /// `roles:all`
    pub fn roles_all() -> String {
        "roles:all".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
