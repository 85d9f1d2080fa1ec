// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Persistent records of the authorization model.
//!
//! Roles, permissions and their join rows are administrator-managed and change
//! rarely. Users carry a role reference plus additive permission overrides.
//!
//! The role reference on stored user documents has historically taken several
//! shapes. [`RoleRef`] accepts all of them and [`RoleRef::normalize`] is the
//! only place that turns one into a [`RoleId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{
    ApprovalStatus, PermissionCode, PermissionId, PermissionSet, RoleId, RolePermissionId, UserId,
};

/// Name of the role that bypasses every role predicate.
pub const ADMIN_ROLE: &str = "admin";

/// Role names whose new accounts wait for administrator approval.
pub const APPROVAL_REQUIRED_ROLES: &[&str] = &["instructor", "manager", "support"];

// =============================================================================
// Role / Permission / RolePermission
// =============================================================================

/// A named role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Identifier.
    pub id: RoleId,
    /// Unique name, e.g. `instructor`.
    pub name: String,
    /// Free text description.
    #[serde(default)]
    pub description: String,
}

impl Role {
    /// Creates a role with a fresh identifier.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: RoleId::generate(),
            name: name.into(),
            description: description.into(),
        }
    }

    /// Returns `true` for the administrator role.
    pub fn is_admin(&self) -> bool {
        self.name == ADMIN_ROLE
    }

    /// Returns `true` if new accounts with this role start as pending.
    pub fn requires_approval(&self) -> bool {
        APPROVAL_REQUIRED_ROLES.contains(&self.name.as_str())
    }
}

/// A grantable permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Identifier.
    pub id: PermissionId,
    /// Unique code.
    pub code: PermissionCode,
    /// Free text description.
    #[serde(default)]
    pub description: String,
}

impl Permission {
    /// Creates a permission with a fresh identifier.
    pub fn new(code: impl Into<PermissionCode>, description: impl Into<String>) -> Self {
        Self {
            id: PermissionId::generate(),
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Join row granting a permission to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    /// Identifier.
    pub id: RolePermissionId,
    /// Granting role.
    pub role_id: RoleId,
    /// Granted permission.
    pub permission_id: PermissionId,
}

impl RolePermission {
    /// Creates a mapping row with a fresh identifier.
    pub fn new(role_id: RoleId, permission_id: PermissionId) -> Self {
        Self {
            id: RolePermissionId::generate(),
            role_id,
            permission_id,
        }
    }
}

/// A role joined with every permission it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleWithPermissions {
    /// The role.
    #[serde(flatten)]
    pub role: Role,
    /// Granted permissions.
    pub permissions: Vec<Permission>,
}

// =============================================================================
// RoleRef
// =============================================================================

/// Reference from a user record to its role.
///
/// Accepts a bare identifier string or an embedded object carrying `_id` or
/// `id` (and optionally the role name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    /// Bare identifier.
    Id(RoleId),
    /// Embedded role document.
    Embedded {
        /// Role identifier.
        #[serde(alias = "_id")]
        id: RoleId,
        /// Role name, when denormalized onto the user.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl RoleRef {
    /// Resolves a possibly absent reference to a role identifier.
    ///
    /// Absent or blank references are a data-integrity failure.
    pub fn normalize(user_id: &UserId, role: Option<&RoleRef>) -> CoreResult<RoleId> {
        let id = match role {
            Some(RoleRef::Id(id)) | Some(RoleRef::Embedded { id, .. }) => id,
            None => return Err(CoreError::missing_role_reference(user_id.clone())),
        };

        if id.as_str().trim().is_empty() {
            return Err(CoreError::missing_role_reference(user_id.clone()));
        }
        Ok(id.clone())
    }
}

impl From<RoleId> for RoleRef {
    fn from(id: RoleId) -> Self {
        RoleRef::Id(id)
    }
}

// =============================================================================
// User
// =============================================================================

/// Pending one-time-password challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Digest of the issued code.
    pub code_hash: String,
    /// Moment after which the code is rejected.
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    /// Returns `true` if the challenge has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A user account as held by the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Unique login email.
    pub email: String,
    /// Opaque password hash.
    pub password_hash: String,
    /// Role reference. Required, see [`RoleRef::normalize`].
    #[serde(default)]
    pub role: Option<RoleRef>,
    /// Approval state.
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    /// Ban flag.
    #[serde(default)]
    pub is_banned: bool,
    /// Additive permission overrides.
    #[serde(default)]
    pub permissions: Vec<PermissionCode>,
    /// Whether the email address was confirmed by OTP.
    #[serde(default)]
    pub is_email_verified: bool,
    /// Outstanding OTP, cleared after use.
    #[serde(default)]
    pub otp: Option<OtpChallenge>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates an unverified user with the given role.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role_id: RoleId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::generate(),
            name: name.into(),
            email: normalize_email(&email.into()),
            password_hash: password_hash.into(),
            role: Some(RoleRef::Id(role_id)),
            approval_status: ApprovalStatus::Approved,
            is_banned: false,
            permissions: Vec::new(),
            is_email_verified: false,
            otp: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the normalized role identifier.
    pub fn role_id(&self) -> CoreResult<RoleId> {
        RoleRef::normalize(&self.id, self.role.as_ref())
    }

    /// Returns the overrides as a set.
    pub fn custom_permissions(&self) -> PermissionSet {
        self.permissions.iter().cloned().collect()
    }

    /// Returns `true` if the account may authenticate at all.
    pub fn can_authenticate(&self) -> bool {
        self.is_email_verified && !self.is_banned && self.approval_status.is_approved()
    }

    /// Bumps `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The public projection of a user, safe to cache and return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Normalized role identifier.
    pub role_id: RoleId,
    /// Approval state.
    pub approval_status: ApprovalStatus,
    /// Ban flag.
    pub is_banned: bool,
    /// Email confirmation flag.
    pub is_email_verified: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Projects a stored user.
    pub fn from_user(user: &User) -> CoreResult<Self> {
        Ok(Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role_id: user.role_id()?,
            approval_status: user.approval_status,
            is_banned: user.is_banned,
            is_email_verified: user.is_email_verified,
            created_at: user.created_at,
        })
    }
}

/// Lowercases and trims an email address for lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// Tests
// =============================================================================
