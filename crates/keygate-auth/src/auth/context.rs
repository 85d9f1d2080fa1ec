// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keygate_core::{PermissionSet, RoleId, UserId, ADMIN_ROLE};

use super::claims::AccessClaims;

/// Authentication context for a request.
///
/// Attached to request extensions after the access token verified. The
/// permission set is the token's snapshot, not the live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// User ID.
    pub user_id: UserId,
    /// Role name.
    pub role: String,
    /// Role ID.
    pub role_id: RoleId,
    /// Permission snapshot from the token.
    pub permissions: PermissionSet,
    /// Request ID for tracing.
    pub request_id: Uuid,
    /// Token expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthContext {
    /// Creates a context from verified access claims.
    pub fn from_claims(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.user_id(),
            role: claims.role.clone(),
            role_id: claims.role_id(),
            permissions: claims.permissions.clone(),
            request_id: Uuid::now_v7(),
            expires_at: claims.expires_at(),
        }
    }

    /// Sets the request ID.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns `true` if the context has the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Returns `true` if the context has any of the given roles.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }

    /// Returns `true` if the token snapshot has the given permission.
    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }

    /// Returns `true` if this context has admin privileges.
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

// =============================================================================
// Tests
// =============================================================================
