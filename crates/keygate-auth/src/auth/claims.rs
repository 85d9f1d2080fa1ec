// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JWT claims structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keygate_core::{PermissionSet, RoleId, UserId};

/// Claims of a short-lived access token.
///
/// Carries a signed snapshot of the user's role and effective permissions at
/// issuance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    // =========================================================================
    // Standard JWT Claims (RFC 7519)
    // =========================================================================
    /// Subject - the user ID.
    pub sub: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at time (Unix timestamp).
    pub iat: i64,

    /// Issuer.
    pub iss: String,

    /// JWT ID.
    pub jti: String,

    // =========================================================================
    // Custom Claims
    // =========================================================================
    /// Role name.
    pub role: String,

    /// Role identifier.
    pub role_id: String,

    /// Effective permission snapshot.
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl AccessClaims {
    /// Creates access claims expiring `expires_in_secs` from now.
    pub fn new(
        user_id: &UserId,
        role: impl Into<String>,
        role_id: &RoleId,
        permissions: PermissionSet,
        issuer: impl Into<String>,
        expires_in_secs: i64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            exp: now + expires_in_secs,
            iat: now,
            iss: issuer.into(),
            jti: Uuid::now_v7().to_string(),
            role: role.into(),
            role_id: role_id.to_string(),
            permissions,
        }
    }

    /// Returns the user ID.
    pub fn user_id(&self) -> UserId {
        UserId::new(self.sub.as_str())
    }

    /// Returns the role ID.
    pub fn role_id(&self) -> RoleId {
        RoleId::new(self.role_id.as_str())
    }

    /// Returns `true` if the snapshot includes `code`.
    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }

    /// Returns `true` if the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    /// Returns the expiration time as a DateTime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Claims of a long-lived refresh token. Identity only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject - the user ID.
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at time (Unix timestamp).
    pub iat: i64,
    /// Issuer.
    pub iss: String,
    /// JWT ID. Makes two refresh tokens issued in the same second distinct.
    pub jti: String,
}

impl RefreshClaims {
    /// Creates refresh claims expiring `expires_in_secs` from now.
    pub fn new(user_id: &UserId, issuer: impl Into<String>, expires_in_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            exp: now + expires_in_secs,
            iat: now,
            iss: issuer.into(),
            jti: Uuid::now_v7().to_string(),
        }
    }

    /// Returns the user ID.
    pub fn user_id(&self) -> UserId {
        UserId::new(self.sub.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims() {
        let perms: PermissionSet = ["course:read", "course:write"].into_iter().collect();
        let claims = AccessClaims::new(
            &UserId::new("u1"),
            "instructor",
            &RoleId::new("r1"),
            perms,
            "keygate",
            900,
        );

        assert_eq!(claims.user_id(), UserId::new("u1"));
        assert_eq!(claims.role_id(), RoleId::new("r1"));
        assert!(claims.has_permission("course:write"));
        assert!(!claims.has_permission("user:delete"));
        assert!(!claims.is_expired());
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_claims_are_unique() {
        let a = RefreshClaims::new(&UserId::new("u1"), "keygate", 60);
        let b = RefreshClaims::new(&UserId::new("u1"), "keygate", 60);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_permissions_serialize_as_list() {
        let perms: PermissionSet = ["b:read", "a:read"].into_iter().collect();
        let claims = AccessClaims::new(
            &UserId::new("u1"),
            "student",
            &RoleId::new("r2"),
            perms,
            "keygate",
            60,
        );
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["permissions"], serde_json::json!(["a:read", "b:read"]));
    }
}
