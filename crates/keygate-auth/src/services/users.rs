// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! User administration.

use serde::{Deserialize, Serialize};
use tracing::info;

use keygate_cache::CacheKeys;
use keygate_core::model::normalize_email;
use keygate_core::{
    ApprovalStatus, EnrichedUser, PermissionCode, RoleId, User, UserId, UserProfile, UserQuery,
};

use super::ServiceContext;
use crate::error::{ApiError, ApiResult};
use crate::session::SessionManager;

/// Partial user update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New login email.
    #[serde(default)]
    pub email: Option<String>,
    /// New role.
    #[serde(default)]
    pub role_id: Option<RoleId>,
}

/// One page of enriched users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListPage {
    /// Users on this page.
    pub users: Vec<EnrichedUser>,
    /// Total matching users.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

/// Administrative operations on user accounts.
#[derive(Debug, Clone)]
pub struct UserAdminService {
    ctx: ServiceContext,
    sessions: SessionManager,
}

impl UserAdminService {
    /// Creates the service.
    pub fn new(ctx: ServiceContext, sessions: SessionManager) -> Self {
        Self { ctx, sessions }
    }

    /// Lists users with effective permissions.
    ///
    /// Pages are cached per query; every distinct role is resolved once per page.
    pub async fn list_users(&self, query: UserQuery) -> ApiResult<UserListPage> {
        let query = query.normalized();
        let key = CacheKeys::users_page(&query);

        self.ctx
            .cache
            .get_or_load(&key, self.ctx.ttls.list_ttl, || async {
                let page = self.ctx.store.find_users(&query).await?;
                let users = self.ctx.permissions.for_users(&page.users).await?;
                Ok::<_, ApiError>(UserListPage {
                    users,
                    total: page.total,
                    page: query.page,
                    limit: query.limit,
                })
            })
            .await
    }

    /// One user with effective permissions.
    pub async fn get_user(&self, user_id: &UserId) -> ApiResult<EnrichedUser> {
        self.ctx.permissions.for_user_id(user_id).await
    }

    /// Applies a partial update.
    pub async fn update_user(
        &self,
        user_id: &UserId,
        request: UpdateUserRequest,
    ) -> ApiResult<UserProfile> {
        let mut user = self.user(user_id).await?;
        let previous_role = user.role_id().ok();

        if let Some(name) = request.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::bad_request("Name is required")
                    .with_field_error("name", "Name is required"));
            }
            user.name = name.to_string();
        }
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            if email != user.email {
                if let Some(other) = self.ctx.store.find_user_by_email(&email).await? {
                    if other.id != user.id {
                        return Err(ApiError::conflict("Email is already in use"));
                    }
                }
                user.email = email;
            }
        }
        let role_changed = match request.role_id {
            Some(role_id) => {
                if self.ctx.store.find_role(&role_id).await?.is_none() {
                    return Err(ApiError::not_found("Role not found")
                        .with_field_error("roleId", "Role not found"));
                }
                let changed = previous_role.as_ref() != Some(&role_id);
                user.role = Some(role_id.into());
                changed
            }
            None => false,
        };
        user.touch();

        let user = self.ctx.store.update_user(user).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;
        if role_changed {
            self.ctx.invalidation.invalidate_role_assignments().await;
            info!(user_id = %user.id, "User role changed");
        }
        Ok(UserProfile::from_user(&user)?)
    }

    /// Deletes a user and its session.
    pub async fn delete_user(&self, user_id: &UserId) -> ApiResult<()> {
        if !self.ctx.store.delete_user(user_id).await? {
            return Err(ApiError::not_found("User not found"));
        }
        self.ctx.invalidation.invalidate_user(user_id).await;
        self.sessions.delete_session(user_id).await?;
        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    // =========================================================================
    // Permission overrides
    // =========================================================================

    /// Adds permission overrides to a user.
    pub async fn assign_permissions(
        &self,
        user_id: &UserId,
        codes: &[String],
    ) -> ApiResult<EnrichedUser> {
        let codes = self.known_codes(codes).await?;
        let mut user = self.user(user_id).await?;

        let mut added = 0;
        for code in codes {
            if !user.permissions.contains(&code) {
                user.permissions.push(code);
                added += 1;
            }
        }
        if added == 0 {
            return Err(ApiError::conflict("Permissions already assigned"));
        }
        user.touch();

        let user = self.ctx.store.update_user(user).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;
        info!(user_id = %user.id, added, "Permissions assigned");
        self.ctx.permissions.for_user(&user).await
    }

    /// Removes permission overrides from a user.
    ///
    /// Codes granted by the role stay effective.
    pub async fn revoke_permissions(
        &self,
        user_id: &UserId,
        codes: &[String],
    ) -> ApiResult<EnrichedUser> {
        let codes = normalize_codes(codes)?;
        let mut user = self.user(user_id).await?;

        let before = user.permissions.len();
        user.permissions.retain(|held| !codes.contains(held));
        let removed = before - user.permissions.len();
        if removed == 0 {
            return Err(ApiError::bad_request("Permissions are not assigned to this user")
                .with_field_error("permissions", "None of the permissions are assigned"));
        }
        user.touch();

        let user = self.ctx.store.update_user(user).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;
        info!(user_id = %user.id, removed, "Permissions revoked");
        self.ctx.permissions.for_user(&user).await
    }

    // =========================================================================
    // Account state
    // =========================================================================

    /// Approves a pending or rejected account.
    pub async fn approve_user(&self, user_id: &UserId) -> ApiResult<UserProfile> {
        let mut user = self.user(user_id).await?;
        if user.approval_status == ApprovalStatus::Approved {
            return Err(ApiError::conflict("User is already approved"));
        }
        user.approval_status = ApprovalStatus::Approved;
        self.save_state(user, "User approved").await
    }

    /// Rejects an account and ends its session.
    pub async fn reject_user(&self, user_id: &UserId) -> ApiResult<UserProfile> {
        let mut user = self.user(user_id).await?;
        if user.approval_status == ApprovalStatus::Rejected {
            return Err(ApiError::conflict("User is already rejected"));
        }
        user.approval_status = ApprovalStatus::Rejected;
        let profile = self.save_state(user, "User rejected").await?;
        self.sessions.delete_session(&profile.id).await?;
        Ok(profile)
    }

    /// Bans an account and ends its session.
    pub async fn ban_user(&self, user_id: &UserId, actor: &UserId) -> ApiResult<UserProfile> {
        if user_id == actor {
            return Err(ApiError::bad_request("You cannot ban yourself"));
        }
        let mut user = self.user(user_id).await?;
        if user.is_banned {
            return Err(ApiError::conflict("User is already banned"));
        }
        user.is_banned = true;
        let profile = self.save_state(user, "User banned").await?;
        self.sessions.delete_session(&profile.id).await?;
        Ok(profile)
    }

    /// Lifts a ban.
    pub async fn unban_user(&self, user_id: &UserId) -> ApiResult<UserProfile> {
        let mut user = self.user(user_id).await?;
        if !user.is_banned {
            return Err(ApiError::conflict("User is not banned"));
        }
        user.is_banned = false;
        self.save_state(user, "User unbanned").await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn user(&self, user_id: &UserId) -> ApiResult<User> {
        self.ctx
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    async fn save_state(&self, mut user: User, event: &'static str) -> ApiResult<UserProfile> {
        user.touch();
        let user = self.ctx.store.update_user(user).await?;
        self.ctx.invalidation.invalidate_user(&user.id).await;
        info!(user_id = %user.id, "{event}");
        Ok(UserProfile::from_user(&user)?)
    }

    /// Normalizes `codes` and rejects any that are not registered.
    async fn known_codes(&self, codes: &[String]) -> ApiResult<Vec<PermissionCode>> {
        let codes = normalize_codes(codes)?;
        let found = self.ctx.store.find_permissions_by_codes(&codes).await?;

        let unknown: Vec<&str> = codes
            .iter()
            .filter(|code| !found.iter().any(|p| &p.code == *code))
            .map(PermissionCode::as_str)
            .collect();
        if !unknown.is_empty() {
            let message = format!("Unknown permissions: {}", unknown.join(", "));
            return Err(ApiError::bad_request(message.clone()).with_field_error("permissions", message));
        }
        Ok(codes)
    }
}

fn normalize_codes(codes: &[String]) -> ApiResult<Vec<PermissionCode>> {
    let mut normalized: Vec<PermissionCode> = Vec::with_capacity(codes.len());
    for code in codes {
        let code = PermissionCode::from(code.trim());
        if !code.as_str().is_empty() && !normalized.contains(&code) {
            normalized.push(code);
        }
    }
    if normalized.is_empty() {
        return Err(ApiError::bad_request("At least one permission is required")
            .with_field_error("permissions", "At least one permission is required"));
    }
    Ok(normalized)
}

// =============================================================================
// Tests
// =============================================================================
