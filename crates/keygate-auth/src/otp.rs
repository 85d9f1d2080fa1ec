// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! One-time passwords for email verification and password reset.
//!
//! Only a SHA-256 digest of the code is stored on the user; the plaintext
//! leaves the process once, inside the email job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use keygate_core::OtpChallenge;

use crate::error::{ApiError, ApiResult};

/// OTP settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Number of digits.
    pub digits: u32,
    /// Validity window in seconds.
    pub ttl_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            digits: 6,
            ttl_secs: 300,
        }
    }
}

impl OtpConfig {
    /// Validity window.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// A freshly issued code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedOtp {
    /// Plaintext code to send.
    pub code: String,
    /// Challenge to store on the user.
    pub challenge: OtpChallenge,
}

/// Issues and checks OTP codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtpIssuer {
    config: OtpConfig,
}

impl OtpIssuer {
    /// Creates an issuer.
    pub fn new(config: OtpConfig) -> Self {
        Self {
            config: OtpConfig {
                digits: config.digits.clamp(4, 10),
                ..config
            },
        }
    }

    /// Issues a code valid from now.
    pub fn issue(&self) -> IssuedOtp {
        self.issue_at(Utc::now())
    }

    /// Issues a code valid from `now`.
    pub fn issue_at(&self, now: DateTime<Utc>) -> IssuedOtp {
        let upper = 10u64.pow(self.config.digits);
        let value = rand::rng().random_range(0..upper);
        let code = format!("{value:0width$}", width = self.config.digits as usize);
        let ttl = chrono::Duration::seconds(self.config.ttl_secs as i64);

        IssuedOtp {
            challenge: OtpChallenge {
                code_hash: otp_digest(&code),
                expires_at: now + ttl,
            },
            code,
        }
    }

    /// Checks `code` against an outstanding challenge.
    ///
    /// A missing or expired challenge and a wrong code are all bad requests.
    pub fn verify(&self, challenge: Option<&OtpChallenge>, code: &str, now: DateTime<Utc>) -> ApiResult<()> {
        let challenge = challenge.ok_or_else(|| {
            ApiError::bad_request("OTP not found or expired").with_field_error("otp", "OTP not found or expired")
        })?;
        if challenge.is_expired_at(now) {
            return Err(ApiError::bad_request("OTP not found or expired")
                .with_field_error("otp", "OTP not found or expired"));
        }
        if challenge.code_hash != otp_digest(code.trim()) {
            return Err(ApiError::bad_request("Invalid OTP").with_field_error("otp", "Invalid OTP"));
        }
        Ok(())
    }
}

/// SHA-256 hex digest of a code.
pub fn otp_digest(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

// =============================================================================
// Tests
// =============================================================================
