// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-request authorization decision.
//!
//! A request is allowed iff
//!
//! 1. the role predicate is absent, the role is in the allowed set, or the role
//!    is `admin`, and
//! 2. every required code is held, where "held" depends on [`SnapshotPolicy`]:
//!
//! | Policy | Checked set |
//! |--------|-------------|
//! | `Union` | token snapshot ∪ live role permissions |
//! | `TokenOnly` | token snapshot |
//! | `LiveOnly` | live role permissions |
//!
//! Under `Union` the live lookup only runs when the snapshot alone falls
//! short. Every denial surfaces as the same `Permission denied`; the cause
//! is logged.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use keygate_core::{CoreError, PermissionCode, PermissionSet, RolePermissionSource};

use super::context::AuthContext;
use crate::error::{ApiError, ApiResult};

/// Message of every authorization denial.
pub const PERMISSION_DENIED: &str = "Permission denied";

// =============================================================================
// SnapshotPolicy
// =============================================================================

/// Trust boundary between the token snapshot and live role data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPolicy {
    /// Snapshot or live role permissions.
    #[default]
    Union,
    /// Snapshot only.
    TokenOnly,
    /// Live role permissions only.
    LiveOnly,
}

impl SnapshotPolicy {
    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::TokenOnly => "token_only",
            Self::LiveOnly => "live_only",
        }
    }
}

impl FromStr for SnapshotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "union" => Ok(Self::Union),
            "token_only" | "token" => Ok(Self::TokenOnly),
            "live_only" | "live" => Ok(Self::LiveOnly),
            other => Err(format!("unknown permission policy: {other}")),
        }
    }
}

impl std::fmt::Display for SnapshotPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Requirement
// =============================================================================

/// What a protected operation demands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    /// Codes that must all be held.
    pub permissions: Vec<PermissionCode>,
    /// Allowed role names. `None` means any role.
    pub roles: Option<Vec<String>>,
}

impl Requirement {
    /// Requires one permission.
    pub fn permission(code: impl Into<PermissionCode>) -> Self {
        Self {
            permissions: vec![code.into()],
            roles: None,
        }
    }

    /// Requires every listed permission.
    pub fn all<I, C>(codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<PermissionCode>,
    {
        Self {
            permissions: codes.into_iter().map(Into::into).collect(),
            roles: None,
        }
    }

    /// Requires one of the listed roles, with no permission.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_roles(roles)
    }

    /// Adds a role predicate.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }
}

// =============================================================================
// Authorizer
// =============================================================================

/// Evaluates [`Requirement`]s against an [`AuthContext`].
#[derive(Clone)]
pub struct Authorizer {
    source: Arc<dyn RolePermissionSource>,
    policy: SnapshotPolicy,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Creates an authorizer reading live role permissions from `source`.
    pub fn new(source: Arc<dyn RolePermissionSource>, policy: SnapshotPolicy) -> Self {
        Self { source, policy }
    }

    /// Active policy.
    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    /// Allows or denies. Denials are `Forbidden("Permission denied")`.
    pub async fn authorize(&self, ctx: &AuthContext, requirement: &Requirement) -> ApiResult<()> {
        if let Some(roles) = &requirement.roles {
            if !ctx.is_admin() && !ctx.has_any_role(roles.as_slice()) {
                warn!(
                    user_id = %ctx.user_id,
                    role = %ctx.role,
                    allowed = ?roles,
                    "Access denied: role not allowed"
                );
                return Err(ApiError::forbidden(PERMISSION_DENIED));
            }
        }

        if requirement.permissions.is_empty() {
            return Ok(());
        }

        let held = self.held_permissions(ctx, &requirement.permissions).await?;
        let missing: Vec<&str> = requirement
            .permissions
            .iter()
            .map(PermissionCode::as_str)
            .filter(|code| !held.contains(code))
            .collect();

        if missing.is_empty() {
            debug!(user_id = %ctx.user_id, policy = %self.policy, "Access granted");
            Ok(())
        } else {
            warn!(
                user_id = %ctx.user_id,
                role = %ctx.role,
                missing = ?missing,
                policy = %self.policy,
                "Access denied: missing permission"
            );
            Err(ApiError::forbidden(PERMISSION_DENIED))
        }
    }

    async fn held_permissions(
        &self,
        ctx: &AuthContext,
        required: &[PermissionCode],
    ) -> ApiResult<PermissionSet> {
        match self.policy {
            SnapshotPolicy::TokenOnly => Ok(ctx.permissions.clone()),
            SnapshotPolicy::LiveOnly => self.live_permissions(ctx).await,
            SnapshotPolicy::Union => {
                if ctx
                    .permissions
                    .contains_all(required.iter().map(PermissionCode::as_str))
                {
                    return Ok(ctx.permissions.clone());
                }
                let live = self.live_permissions(ctx).await?;
                Ok(ctx.permissions.union(&live))
            }
        }
    }

    async fn live_permissions(&self, ctx: &AuthContext) -> ApiResult<PermissionSet> {
        match self.source.role_permissions(&ctx.role_id).await {
            Ok(resolved) => Ok(resolved.permissions),
            Err(CoreError::RoleNotFound { role_id }) => {
                warn!(user_id = %ctx.user_id, %role_id, "Token references a deleted role");
                Ok(PermissionSet::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
