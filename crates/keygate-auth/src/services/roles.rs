// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Role and permission administration.

use serde::{Deserialize, Serialize};
use tracing::info;

use keygate_cache::CacheKeys;
use keygate_core::{
    CoreError, Permission, PermissionCode, Role, RoleId, RolePermission, RoleWithPermissions,
};

use super::ServiceContext;
use crate::error::{ApiError, ApiResult, ValidationErrors};

/// New role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    /// Unique role name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// New permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    /// Unique `resource:action` code.
    pub code: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// Administrative operations on roles and their grants.
#[derive(Debug, Clone)]
pub struct RoleAdminService {
    ctx: ServiceContext,
}

impl RoleAdminService {
    /// Creates the service.
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Creates a role.
    pub async fn create_role(&self, request: CreateRoleRequest) -> ApiResult<Role> {
        let name = request.name.trim().to_lowercase();
        if name.is_empty() {
            return Err(ApiError::bad_request("Role name is required")
                .with_field_error("name", "Role name is required"));
        }

        let role = self
            .ctx
            .store
            .create_role(Role::new(name, request.description.trim()))
            .await?;
        self.ctx.invalidation.invalidate_all_roles().await;
        info!(role_id = %role.id, role = %role.name, "Role created");
        Ok(role)
    }

    /// Registers a permission code.
    pub async fn create_permission(&self, request: CreatePermissionRequest) -> ApiResult<Permission> {
        let code = request.code.trim().to_lowercase();
        let mut errors = ValidationErrors::new();
        match code.split_once(':') {
            Some((resource, action)) if !resource.is_empty() && !action.is_empty() => {}
            _ => errors.add("code", "Permission code must look like resource:action"),
        }
        errors.into_result(())?;

        let permission = self
            .ctx
            .store
            .create_permission(Permission::new(code, request.description.trim()))
            .await?;
        info!(code = %permission.code, "Permission created");
        Ok(permission)
    }

    /// Lists every registered permission.
    pub async fn list_permissions(&self) -> ApiResult<Vec<Permission>> {
        Ok(self.ctx.store.list_permissions().await?)
    }

    /// Grants a permission to a role.
    pub async fn grant_role_permission(
        &self,
        role_id: &RoleId,
        code: &str,
    ) -> ApiResult<RolePermission> {
        let (role, permission) = self.role_and_permission(role_id, code).await?;

        let mapping = match self
            .ctx
            .store
            .create_role_permission(RolePermission::new(role.id.clone(), permission.id.clone()))
            .await
        {
            Ok(mapping) => mapping,
            Err(CoreError::Conflict { .. }) => {
                return Err(ApiError::conflict("Permission already granted to role"));
            }
            Err(e) => return Err(e.into()),
        };

        self.ctx.invalidation.invalidate_role_mapping_change(&role.id).await;
        info!(role = %role.name, code = %permission.code, "Permission granted to role");
        Ok(mapping)
    }

    /// Revokes a permission from a role.
    pub async fn revoke_role_permission(&self, role_id: &RoleId, code: &str) -> ApiResult<()> {
        let (role, permission) = self.role_and_permission(role_id, code).await?;

        if !self
            .ctx
            .store
            .delete_role_permission(&role.id, &permission.id)
            .await?
        {
            return Err(ApiError::not_found("Permission is not granted to role"));
        }

        self.ctx.invalidation.invalidate_role_mapping_change(&role.id).await;
        info!(role = %role.name, code = %permission.code, "Permission revoked from role");
        Ok(())
    }

    /// Every role with its permissions, cached under `roles:all`.
    pub async fn roles_with_permissions(&self) -> ApiResult<Vec<RoleWithPermissions>> {
        Ok(self
            .ctx
            .cache
            .get_or_load(&CacheKeys::roles_all(), self.ctx.ttls.roles_ttl, || {
                self.ctx.store.roles_with_permissions()
            })
            .await?)
    }

    async fn role_and_permission(&self, role_id: &RoleId, code: &str) -> ApiResult<(Role, Permission)> {
        let role = self
            .ctx
            .store
            .find_role(role_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Role not found"))?;
        let code = PermissionCode::from(code.trim());
        let permission = self
            .ctx
            .store
            .find_permission_by_code(&code)
            .await?
            .ok_or_else(|| {
                ApiError::not_found("Permission not found")
                    .with_field_error("code", format!("Unknown permission: {code}"))
            })?;
        Ok((role, permission))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use keygate_cache::{CacheConfig, CacheGuard, MemoryCache};
    use keygate_core::{AuthStore, MemoryStore, User};
    use std::sync::Arc;

    struct Fixture {
        service: RoleAdminService,
        ctx: ServiceContext,
        store: Arc<MemoryStore>,
        cache: Arc<MemoryCache>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let config = CacheConfig::for_testing();
        let ctx = ServiceContext::new(
            store.clone(),
            CacheGuard::new(cache.clone(), &config),
            config,
        );
        Fixture {
            service: RoleAdminService::new(ctx.clone()),
            ctx,
            store,
            cache,
        }
    }

    fn role(name: &str) -> CreateRoleRequest {
        CreateRoleRequest {
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn permission(code: &str) -> CreatePermissionRequest {
        CreatePermissionRequest {
            code: code.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_role_and_permission() {
        let f = fixture();
        let created = f.service.create_role(role(" Instructor ")).await.unwrap();
        assert_eq!(created.name, "instructor");
        let err = f.service.create_role(role("instructor")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        f.service.create_permission(permission("course:write")).await.unwrap();
        let err = f.service.create_permission(permission("course:write")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let err = f.service.create_permission(permission("coursewrite")).await.unwrap_err();
        assert!(err.field_errors().unwrap().get("code").is_some());
    }

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let f = fixture();
        let instructor = f.service.create_role(role("instructor")).await.unwrap();
        f.service.create_permission(permission("course:write")).await.unwrap();

        f.service
            .grant_role_permission(&instructor.id, "course:write")
            .await
            .unwrap();
        let err = f
            .service
            .grant_role_permission(&instructor.id, "course:write")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Permission already granted to role");

        f.service
            .revoke_role_permission(&instructor.id, "course:write")
            .await
            .unwrap();
        let err = f
            .service
            .revoke_role_permission(&instructor.id, "course:write")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = f
            .service
            .grant_role_permission(&RoleId::new("ghost"), "course:write")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Role not found");
    }

    #[tokio::test]
    async fn test_mapping_change_invalidates_cached_views() {
        let f = fixture();
        let instructor = f.service.create_role(role("instructor")).await.unwrap();
        f.service.create_permission(permission("course:write")).await.unwrap();
        let user = f
            .store
            .create_user(User::new("I", "i@example.com", "hash", instructor.id.clone()))
            .await
            .unwrap();

        let before = f.ctx.permissions.for_user_id(&user.id).await.unwrap();
        assert!(!before.has_permission("course:write"));
        let roles = f.service.roles_with_permissions().await.unwrap();
        assert!(roles[0].permissions.is_empty());

        f.service
            .grant_role_permission(&instructor.id, "course:write")
            .await
            .unwrap();
        assert!(!f.cache.contains_key(&CacheKeys::roles_all()));
        assert!(!f.cache.contains_key(&CacheKeys::role_permissions(&instructor.id)));

        let after = f.ctx.permissions.for_user_id(&user.id).await.unwrap();
        assert!(after.has_permission("course:write"));
        let live = f.ctx.role_source().role_permissions(&instructor.id).await.unwrap();
        assert!(live.permissions.contains("course:write"));
        let roles = f.service.roles_with_permissions().await.unwrap();
        assert_eq!(roles[0].permissions[0].code.as_str(), "course:write");
    }
}
