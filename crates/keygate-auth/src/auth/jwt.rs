// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JWT token management.
//!
//! Access and refresh tokens are signed with separate HS256 secrets, so a
//! refresh token never verifies as an access token and vice versa.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keygate_core::{PermissionSet, RoleId, UserId};

use super::claims::{AccessClaims, RefreshClaims};

// =============================================================================
// TokenError
// =============================================================================

/// Token signing and verification failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The signature is valid but the token is past its expiry.
    #[error("Token expired")]
    Expired,

    /// Malformed, wrongly signed or otherwise unacceptable token.
    #[error("Invalid token: {reason}")]
    Invalid {
        /// Verifier's reason.
        reason: String,
    },

    /// Encoding failed.
    #[error("Failed to sign token: {message}")]
    Signing {
        /// Encoder's message.
        message: String,
    },

    /// The manager was configured with unusable settings.
    #[error("Invalid JWT configuration: {message}")]
    Configuration {
        /// What is wrong.
        message: String,
    },
}

impl TokenError {
    /// Creates an invalid-token error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    fn from_jwt(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::invalid("signature mismatch"),
            ErrorKind::InvalidIssuer => Self::invalid("issuer mismatch"),
            ErrorKind::InvalidToken => Self::invalid("malformed token"),
            _ => Self::invalid(e.to_string()),
        }
    }
}

// =============================================================================
// JwtConfig
// =============================================================================

/// JWT configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Secret for access tokens.
    #[serde(skip_serializing)]
    pub access_secret: String,
    /// Secret for refresh tokens.
    #[serde(skip_serializing)]
    pub refresh_secret: String,
    /// Token issuer.
    pub issuer: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds. Also the session lifetime.
    pub refresh_ttl_secs: i64,
    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            issuer: "keygate".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            leeway_secs: 0,
        }
    }
}

impl JwtConfig {
    /// Creates a configuration with the given secrets.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            ..Default::default()
        }
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets both lifetimes.
    pub fn with_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl_secs = access.as_secs() as i64;
        self.refresh_ttl_secs = refresh.as_secs() as i64;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(TokenError::configuration("JWT secrets are not configured"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(TokenError::configuration(
                "access and refresh secrets must differ",
            ));
        }
        if self.access_ttl_secs <= 0 || self.refresh_ttl_secs <= 0 {
            return Err(TokenError::configuration("token lifetimes must be positive"));
        }
        if self.access_ttl_secs >= self.refresh_ttl_secs {
            return Err(TokenError::configuration(
                "access token lifetime must be shorter than refresh token lifetime",
            ));
        }
        if self.access_secret.len() < 32 || self.refresh_secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than recommended (32 bytes)");
        }
        Ok(())
    }
}

// =============================================================================
// JwtManager
// =============================================================================

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Issues and verifies access and refresh tokens.
#[derive(Clone)]
pub struct JwtManager {
    config: Arc<JwtConfig>,
    access: Arc<KeyPair>,
    refresh: Arc<KeyPair>,
    validation: Arc<Validation>,
}

impl JwtManager {
    /// Creates a new JWT manager with the given configuration.
    pub fn new(config: JwtConfig) -> Result<Self, TokenError> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.leeway = config.leeway_secs;
        validation.validate_aud = false;

        Ok(Self {
            access: Arc::new(KeyPair::from_secret(&config.access_secret)),
            refresh: Arc::new(KeyPair::from_secret(&config.refresh_secret)),
            config: Arc::new(config),
            validation: Arc::new(validation),
        })
    }

    /// Signs access claims.
    pub fn sign_access(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        sign(claims, &self.access.encoding)
    }

    /// Signs refresh claims.
    pub fn sign_refresh(&self, claims: &RefreshClaims) -> Result<String, TokenError> {
        sign(claims, &self.refresh.encoding)
    }

    /// Issues an access token carrying a role and permission snapshot.
    pub fn issue_access_token(
        &self,
        user_id: &UserId,
        role: &str,
        role_id: &RoleId,
        permissions: PermissionSet,
    ) -> Result<String, TokenError> {
        let claims = AccessClaims::new(
            user_id,
            role,
            role_id,
            permissions,
            &self.config.issuer,
            self.config.access_ttl_secs,
        );
        self.sign_access(&claims)
    }

    /// Issues a refresh token.
    pub fn issue_refresh_token(&self, user_id: &UserId) -> Result<String, TokenError> {
        let claims = RefreshClaims::new(user_id, &self.config.issuer, self.config.refresh_ttl_secs);
        self.sign_refresh(&claims)
    }

    /// Verifies an access token.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.access.decoding, &self.validation)
    }

    /// Verifies a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.refresh.decoding, &self.validation)
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.config.access_ttl_secs.max(0) as u64)
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.config.refresh_ttl_secs.max(0) as u64)
    }

    /// Token issuer.
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.config.issuer)
            .field("access_ttl_secs", &self.config.access_ttl_secs)
            .field("refresh_ttl_secs", &self.config.refresh_ttl_secs)
            .finish()
    }
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, key).map_err(|e| TokenError::Signing {
        message: e.to_string(),
    })
}

fn verify<T: DeserializeOwned>(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<T, TokenError> {
    decode::<T>(token, key, validation)
        .map(|data| data.claims)
        .map_err(TokenError::from_jwt)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "access-secret-key-that-is-long-enough-for-tests";
    const REFRESH: &str = "refresh-secret-key-that-is-long-enough-for-tests";

    fn manager() -> JwtManager {
        JwtManager::new(JwtConfig::new(ACCESS, REFRESH)).unwrap()
    }

    #[test]
    fn test_access_round_trip() {
        let jwt = manager();
        let perms: PermissionSet = ["course:read"].into_iter().collect();
        let token = jwt
            .issue_access_token(&UserId::new("u1"), "instructor", &RoleId::new("r1"), perms)
            .unwrap();

        let claims = jwt.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, "instructor");
        assert_eq!(claims.iss, "keygate");
        assert!(claims.has_permission("course:read"));
    }

    #[test]
    fn test_expired_is_distinct_from_invalid() {
        let jwt = manager();
        let claims = AccessClaims::new(
            &UserId::new("u1"),
            "student",
            &RoleId::new("r1"),
            PermissionSet::new(),
            "keygate",
            -3600,
        );
        let token = jwt.sign_access(&claims).unwrap();
        assert_eq!(jwt.verify_access(&token), Err(TokenError::Expired));

        assert!(matches!(
            jwt.verify_access("not.a.token"),
            Err(TokenError::Invalid { .. })
        ));
    }

    #[test]
    fn test_secrets_are_separate() {
        let jwt = manager();
        let refresh = jwt.issue_refresh_token(&UserId::new("u1")).unwrap();
        assert!(matches!(
            jwt.verify_access(&refresh),
            Err(TokenError::Invalid { .. })
        ));
        assert_eq!(jwt.verify_refresh(&refresh).unwrap().sub, "u1");
    }

    #[test]
    fn test_wrong_issuer() {
        let jwt = manager();
        let other = JwtManager::new(JwtConfig::new(ACCESS, REFRESH).with_issuer("other")).unwrap();
        let token = other.issue_refresh_token(&UserId::new("u1")).unwrap();
        assert!(matches!(
            jwt.verify_refresh(&token),
            Err(TokenError::Invalid { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(JwtManager::new(JwtConfig::default()).is_err());
        assert!(JwtManager::new(JwtConfig::new(ACCESS, ACCESS)).is_err());

        let inverted = JwtConfig::new(ACCESS, REFRESH)
            .with_ttls(Duration::from_secs(3600), Duration::from_secs(60));
        assert!(matches!(
            JwtManager::new(inverted),
            Err(TokenError::Configuration { .. })
        ));
    }
}
