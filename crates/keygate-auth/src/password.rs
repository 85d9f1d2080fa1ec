// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Password hashing capability.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Opaque password hashing.
///
/// Services never inspect hashes; they only store what [`hash`](Self::hash)
/// returns and hand it back to [`verify`](Self::verify).
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash(&self, password: &str) -> ApiResult<String>;

    /// Returns `true` if `password` produced `hash`.
    fn verify(&self, password: &str, hash: &str) -> ApiResult<bool>;
}

/// Password rules applied before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 6 }
    }
}

impl PasswordPolicy {
    /// Rejects passwords that break the policy.
    pub fn check(&self, field: &str, password: &str) -> ApiResult<()> {
        if password.chars().count() < self.min_length {
            let message = format!("Password must be at least {} characters", self.min_length);
            return Err(ApiError::bad_request(message.clone()).with_field_error(field, message));
        }
        Ok(())
    }
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Default, Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Creates a hasher.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> ApiResult<String> {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        let salt = SaltString::encode_b64(&bytes)
            .map_err(|e| ApiError::internal(format!("salt encoding failed: {e}")))?;
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> ApiResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ApiError::data_integrity(format!("stored password hash is malformed: {e}")))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

// =============================================================================
// Tests
// =============================================================================
