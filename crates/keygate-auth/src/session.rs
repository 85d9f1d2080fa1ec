// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Single-device session management.
//!
//! Each user has at most one session, stored under `session:user:{id}`. A new
//! login overwrites it, which silently supersedes the previous device: its
//! refresh token no longer matches.
//!
//! ```text
//! NoSession ──create──▶ Active ──create──▶ Active (previous superseded)
//!                         │
//!                         ├──expires_at passed──▶ Expired (deleted on next validate)
//!                         └──delete──────────────▶ NoSession
//! ```
//!
//! Unlike every other cache consumer, the session store is the authority for
//! refresh-token validity. It is accessed directly rather than through the
//! fail-open guard, and any failure is returned as
//! [`SessionError::StoreUnavailable`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use keygate_cache::{CacheError, CacheKeys, CacheResult, CacheStore};
use keygate_core::UserId;

// =============================================================================
// Errors
// =============================================================================

/// Session store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No session exists for the user.
    #[error("No session for user {user_id}")]
    NotFound {
        /// User without a session.
        user_id: UserId,
    },

    /// The session store failed or timed out.
    #[error("Session store unavailable during {operation}: {message}")]
    StoreUnavailable {
        /// Operation being attempted.
        operation: &'static str,
        /// Backend error message.
        message: String,
    },
}

impl SessionError {
    fn unavailable(operation: &'static str, error: CacheError) -> Self {
        Self::StoreUnavailable {
            operation,
            message: error.to_string(),
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

// =============================================================================
// Session
// =============================================================================

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Owner.
    pub user_id: UserId,
    /// SHA-256 hex digest of the refresh token.
    pub refresh_token_hash: String,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    /// Expiry, epoch milliseconds.
    pub expires_at: i64,
}

impl Session {
    fn new(user_id: &UserId, refresh_token: &str, ttl: Duration) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            user_id: user_id.clone(),
            refresh_token_hash: token_digest(refresh_token),
            created_at: now,
            expires_at: now.saturating_add(ttl.as_millis() as i64),
        }
    }

    /// Returns `true` if the session is past its expiry at `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at < now_ms
    }

    /// Returns `true` if `refresh_token` is the session's credential.
    pub fn matches(&self, refresh_token: &str) -> bool {
        self.refresh_token_hash == token_digest(refresh_token)
    }
}

/// SHA-256 hex digest of a token.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// =============================================================================
// Configuration
// =============================================================================

/// Session manager settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Session lifetime. Equal to the refresh token lifetime.
    pub ttl: Duration,
    /// Deadline for each store call.
    pub operation_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
            operation_timeout: Duration::from_secs(2),
        }
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Creates, validates and deletes single-device sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CacheStore>,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl SessionManager {
    /// Creates a manager over a session store.
    pub fn new(store: Arc<dyn CacheStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Session lifetime.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Creates or replaces the user's session. Last writer wins.
    pub async fn create_session(&self, user_id: &UserId, refresh_token: &str) -> SessionResult<()> {
        let session = Session::new(user_id, refresh_token, self.config.ttl);
        self.write("create_session", &session).await?;
        info!(%user_id, "Session created");
        Ok(())
    }

    /// Checks a refresh token against the user's session.
    ///
    /// Absent, expired or mismatched sessions read as `false`; an expired
    /// session is deleted on the way.
    pub async fn validate_session(&self, user_id: &UserId, refresh_token: &str) -> SessionResult<bool> {
        let Some(session) = self.read("validate_session", user_id).await? else {
            debug!(%user_id, "No session");
            return Ok(false);
        };

        if session.is_expired_at(Utc::now().timestamp_millis()) {
            debug!(%user_id, "Session expired");
            self.delete_session(user_id).await?;
            return Ok(false);
        }

        if !session.matches(refresh_token) {
            warn!(%user_id, "Refresh token does not match the active session");
            return Ok(false);
        }
        Ok(true)
    }

    /// Deletes the user's session. Idempotent.
    pub async fn delete_session(&self, user_id: &UserId) -> SessionResult<()> {
        let key = CacheKeys::session(user_id);
        self.call("delete_session", self.store.delete(&key)).await?;
        debug!(%user_id, "Session deleted");
        Ok(())
    }

    /// Returns the user's session, if any.
    pub async fn get_session(&self, user_id: &UserId) -> SessionResult<Option<Session>> {
        self.read("get_session", user_id).await
    }

    /// Rotates the refresh token of an existing session and extends its expiry.
    pub async fn update_session(&self, user_id: &UserId, refresh_token: &str) -> SessionResult<()> {
        let Some(existing) = self.read("update_session", user_id).await? else {
            return Err(SessionError::NotFound {
                user_id: user_id.clone(),
            });
        };

        let mut session = Session::new(user_id, refresh_token, self.config.ttl);
        session.created_at = existing.created_at;
        self.write("update_session", &session).await?;
        debug!(%user_id, "Session rotated");
        Ok(())
    }

    /// Returns `true` if the user has an unexpired session.
    pub async fn has_active_session(&self, user_id: &UserId) -> SessionResult<bool> {
        Ok(self
            .read("has_active_session", user_id)
            .await?
            .is_some_and(|s| !s.is_expired_at(Utc::now().timestamp_millis())))
    }

    async fn read(&self, operation: &'static str, user_id: &UserId) -> SessionResult<Option<Session>> {
        let key = CacheKeys::session(user_id);
        let Some(value) = self.call(operation, self.store.get(&key)).await? else {
            return Ok(None);
        };

        match serde_json::from_value(value) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(%user_id, error = %e, "Discarding undecodable session");
                self.call(operation, self.store.delete(&key)).await?;
                Ok(None)
            }
        }
    }

    async fn write(&self, operation: &'static str, session: &Session) -> SessionResult<()> {
        let key = CacheKeys::session(&session.user_id);
        let value = serde_json::to_value(session).map_err(|e| SessionError::StoreUnavailable {
            operation,
            message: e.to_string(),
        })?;
        self.call(operation, self.store.set(&key, value, self.config.ttl))
            .await
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> SessionResult<T>
    where
        F: std::future::Future<Output = CacheResult<T>>,
    {
        match tokio::time::timeout(self.config.operation_timeout, fut).await {
            Ok(result) => result.map_err(|e| SessionError::unavailable(operation, e)),
            Err(_) => Err(SessionError::unavailable(
                operation,
                CacheError::timeout(operation, self.config.operation_timeout),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
