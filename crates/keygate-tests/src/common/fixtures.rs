// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Seeded catalog, secrets and configuration documents shared by the suites.

use std::collections::HashMap;

use keygate_auth::{ApiResult, JwtConfig, PasswordHasher};
use keygate_core::{AuthStore, Permission, Role, RoleId, RolePermission};

// =============================================================================
// Names
// =============================================================================

/// Self-service role without approval.
pub const STUDENT: &str = "student";

/// Role that requires approval.
pub const INSTRUCTOR: &str = "instructor";

/// Administrator role.
pub const ADMIN: &str = "admin";

/// Password given to every seeded user.
pub const TEST_PASSWORD: &str = "correct-horse";

/// Access token secret.
pub const TEST_ACCESS_SECRET: &str = "test-access-secret-0123456789";

/// Refresh token secret.
pub const TEST_REFRESH_SECRET: &str = "test-refresh-secret-0123456789";

/// Every permission code in the catalog.
pub const PERMISSION_CODES: &[&str] = &[
    "course:read",
    "course:write",
    "course:publish",
    "report:read",
    "user:manage",
];

/// Codes granted to the student role.
pub const STUDENT_GRANTS: &[&str] = &["course:read"];

/// Codes granted to the instructor role.
pub const INSTRUCTOR_GRANTS: &[&str] = &["course:read", "course:write"];

// =============================================================================
// Password hashing
// =============================================================================

/// Reversible hasher so tests avoid the cost of Argon2.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHasher;

impl PlainHasher {
    /// The stored form of `password`.
    pub fn encode(password: &str) -> String {
        format!("plain${}", password)
    }
}

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> ApiResult<String> {
        Ok(Self::encode(password))
    }

    fn verify(&self, password: &str, hash: &str) -> ApiResult<bool> {
        Ok(hash == Self::encode(password))
    }
}

// =============================================================================
// JWT
// =============================================================================

/// Token settings with a short access lifetime.
pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        access_secret: TEST_ACCESS_SECRET.to_string(),
        refresh_secret: TEST_REFRESH_SECRET.to_string(),
        issuer: "keygate".to_string(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 3600,
        leeway_secs: 0,
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Roles and permissions seeded into a store.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Roles by name.
    pub roles: HashMap<String, Role>,
    /// Permissions by code.
    pub permissions: HashMap<String, Permission>,
}

impl Catalog {
    /// Seeds student, instructor and admin with their grants.
    pub async fn seed(store: &dyn AuthStore) -> Self {
        let mut permissions = HashMap::new();
        for code in PERMISSION_CODES {
            let permission = store
                .create_permission(Permission::new(*code, format!("Allows {}", code)))
                .await
                .expect("seed permission");
            permissions.insert(code.to_string(), permission);
        }

        let mut catalog = Self {
            roles: HashMap::new(),
            permissions,
        };

        for (name, grants) in [
            (STUDENT, STUDENT_GRANTS),
            (INSTRUCTOR, INSTRUCTOR_GRANTS),
            (ADMIN, &[][..]),
        ] {
            let role = store
                .create_role(Role::new(name, format!("{} role", name)))
                .await
                .expect("seed role");
            for code in grants {
                store
                    .create_role_permission(RolePermission::new(
                        role.id.clone(),
                        catalog.permissions[*code].id.clone(),
                    ))
                    .await
                    .expect("seed mapping");
            }
            catalog.roles.insert(name.to_string(), role);
        }

        catalog
    }

    /// The role named `name`.
    pub fn role(&self, name: &str) -> &Role {
        &self.roles[name]
    }

    /// Id of the role named `name`.
    pub fn role_id(&self, name: &str) -> RoleId {
        self.role(name).id.clone()
    }
}

// =============================================================================
// Configuration documents
// =============================================================================

/// A minimal valid YAML configuration.
pub const MINIMAL_YAML: &str = r#"
security:
  jwt:
    access_secret: "yaml-access-secret-0123456789"
    refresh_secret: "yaml-refresh-secret-0123456789"
"#;

/// A YAML configuration touching every section.
pub const FULL_YAML: &str = r#"
service:
  name: keygate-test
  environment: staging
security:
  jwt:
    access_secret: "yaml-access-secret-0123456789-abcdef"
    refresh_secret: "yaml-refresh-secret-0123456789-abcdef"
    issuer: keygate-test
    access_ttl_secs: 600
    refresh_ttl_secs: 86400
    leeway_secs: 5
  password:
    min_length: 10
  otp:
    digits: 8
    ttl_secs: 120
cache:
  operation_timeout_ms: 100
  user_ttl_secs: 60
  permissions_ttl_secs: 60
  roles_ttl_secs: 120
  list_ttl_secs: 15
  metrics_enabled: true
session:
  operation_timeout_ms: 500
authorization:
  policy: live_only
dispatcher:
  queue: test-email
  attempts: 3
  backoff_ms: 100
  concurrency: 2
  capacity: 16
logging:
  level: debug
  format: json
"#;

/// The same settings as a TOML document.
pub const FULL_TOML: &str = r#"
[service]
name = "keygate-test"
environment = "staging"

[security.jwt]
access_secret = "toml-access-secret-0123456789-abcdef"
refresh_secret = "toml-refresh-secret-0123456789-abcdef"
access_ttl_secs = 600
refresh_ttl_secs = 86400

[authorization]
policy = "token_only"
"#;
