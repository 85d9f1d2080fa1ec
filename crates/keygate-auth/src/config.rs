// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Runtime settings of the auth services.

use std::time::Duration;

use keygate_core::RetryPolicy;

use crate::auth::{JwtConfig, SnapshotPolicy};
use crate::otp::OtpConfig;
use crate::password::PasswordPolicy;
use crate::session::SessionConfig;

// =============================================================================
// AuthConfig
// =============================================================================

/// Settings for every service assembled into an [`AppState`](crate::state::AppState).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token signing.
    pub jwt: JwtConfig,
    /// Session store behavior.
    pub session: SessionConfig,
    /// OTP codes.
    pub otp: OtpConfig,
    /// Password rules.
    pub password: PasswordPolicy,
    /// Authorization snapshot policy.
    pub policy: SnapshotPolicy,
    /// Retry policy attached to queued emails.
    pub email_retry: RetryPolicy,
}

impl AuthConfig {
    /// Creates a configuration with default settings around `jwt`.
    ///
    /// The session lifetime follows the refresh token lifetime.
    pub fn new(jwt: JwtConfig) -> Self {
        let session = SessionConfig {
            ttl: Duration::from_secs(jwt.refresh_ttl_secs.max(0) as u64),
            ..SessionConfig::default()
        };
        Self {
            jwt,
            session,
            otp: OtpConfig::default(),
            password: PasswordPolicy::default(),
            policy: SnapshotPolicy::default(),
            email_retry: RetryPolicy::default(),
        }
    }

    /// Sets the session store deadline.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session.operation_timeout = timeout;
        self
    }

    /// Sets the OTP settings.
    pub fn with_otp(mut self, otp: OtpConfig) -> Self {
        self.otp = otp;
        self
    }

    /// Sets the password rules.
    pub fn with_password_policy(mut self, password: PasswordPolicy) -> Self {
        self.password = password;
        self
    }

    /// Sets the authorization policy.
    pub fn with_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the email retry policy.
    pub fn with_email_retry(mut self, retry: RetryPolicy) -> Self {
        self.email_retry = retry;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
