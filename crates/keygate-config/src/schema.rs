// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for keygate.
//!
//! # Schema Structure
//!
//! ```text
//! KeygateConfig
//! ├── service: ServiceConfig
//! ├── security: SecurityConfig
//! │   ├── jwt: JwtSettings
//! │   ├── password: PasswordSettings
//! │   └── otp: OtpSettings
//! ├── cache: CacheSettings
//! ├── session: SessionSettings
//! ├── authorization: AuthorizationConfig
//! ├── dispatcher: DispatcherConfig
//! └── logging: LoggingConfig
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Default access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Default refresh token and session lifetime (7 days).
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Default deadline for a single cache call.
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 250;

/// Default deadline for a single session store call.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 2000;

/// Default cached user profile TTL.
pub const DEFAULT_USER_TTL_SECS: u64 = 300;

/// Default cached permission snapshot TTL.
pub const DEFAULT_PERMISSIONS_TTL_SECS: u64 = 300;

/// Default cached role TTL.
pub const DEFAULT_ROLES_TTL_SECS: u64 = 600;

/// Default cached user listing TTL.
pub const DEFAULT_LIST_TTL_SECS: u64 = 60;

/// Default OTP validity window.
pub const DEFAULT_OTP_TTL_SECS: u64 = 300;

/// Default email queue name.
pub const DEFAULT_EMAIL_QUEUE: &str = "email-queue";

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Marker printed in place of secrets.
pub const REDACTED: &str = "***";

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for keygate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeygateConfig {
    /// Service identification.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Token, password and OTP settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Cache TTLs and deadline.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Session store settings.
    #[serde(default)]
    pub session: SessionSettings,

    /// Authorization policy.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Background email queue.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KeygateConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.service.validate()?;
        self.security.validate()?;
        self.cache.validate()?;
        self.session.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }

    /// Returns a copy with every secret replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.security.jwt.access_secret = SecretValue::new(REDACTED);
        copy.security.jwt.refresh_secret = SecretValue::new(REDACTED);
        copy
    }
}

// =============================================================================
// Service
// =============================================================================

/// Service identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name, used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Deployment environment label.
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_service_name() -> String {
    "keygate".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl ServiceConfig {
    /// Validates the service section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("service.name", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            environment: default_environment(),
        }
    }
}

// =============================================================================
// Security
// =============================================================================

/// Token, password and OTP settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Token signing.
    #[serde(default)]
    pub jwt: JwtSettings,

    /// Password rules.
    #[serde(default)]
    pub password: PasswordSettings,

    /// OTP codes.
    #[serde(default)]
    pub otp: OtpSettings,
}

impl SecurityConfig {
    /// Validates the security section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.jwt.validate()?;
        self.password.validate()?;
        self.otp.validate()?;
        Ok(())
    }
}

/// Token signing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtSettings {
    /// Secret for access tokens.
    #[serde(default)]
    pub access_secret: SecretValue,

    /// Secret for refresh tokens. Must differ from the access secret.
    #[serde(default)]
    pub refresh_secret: SecretValue,

    /// Token issuer.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,

    /// Refresh token lifetime. Sessions expire with it.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,

    /// Clock skew tolerance.
    #[serde(default)]
    pub leeway_secs: u64,
}

fn default_issuer() -> String {
    "keygate".to_string()
}

fn default_access_ttl() -> i64 {
    DEFAULT_ACCESS_TTL_SECS
}

fn default_refresh_ttl() -> i64 {
    DEFAULT_REFRESH_TTL_SECS
}

impl JwtSettings {
    /// Validates the JWT settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::missing_field("security.jwt.access_secret"));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::missing_field("security.jwt.refresh_secret"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::validation(
                "security.jwt.refresh_secret",
                "must differ from the access secret",
            ));
        }
        for (field, secret) in [
            ("security.jwt.access_secret", &self.access_secret),
            ("security.jwt.refresh_secret", &self.refresh_secret),
        ] {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::validation(
                    field,
                    format!("must be at least {} bytes", MIN_SECRET_LEN),
                ));
            }
        }
        if self.access_ttl_secs <= 0 {
            return Err(ConfigError::validation(
                "security.jwt.access_ttl_secs",
                "must be positive",
            ));
        }
        if self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err(ConfigError::validation(
                "security.jwt.refresh_ttl_secs",
                "must be longer than the access token lifetime",
            ));
        }
        Ok(())
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            access_secret: SecretValue::default(),
            refresh_secret: SecretValue::default(),
            issuer: default_issuer(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            leeway_secs: 0,
        }
    }
}

/// Password rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordSettings {
    /// Minimum length in characters.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

fn default_min_length() -> usize {
    6
}

impl PasswordSettings {
    /// Validates the password rules.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_length == 0 || self.min_length > 128 {
            return Err(ConfigError::out_of_range(
                "security.password.min_length",
                self.min_length,
                1,
                128,
            ));
        }
        Ok(())
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
        }
    }
}

/// OTP code settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtpSettings {
    /// Number of digits.
    #[serde(default = "default_otp_digits")]
    pub digits: u32,

    /// Validity window in seconds.
    #[serde(default = "default_otp_ttl")]
    pub ttl_secs: u64,
}

fn default_otp_digits() -> u32 {
    6
}

fn default_otp_ttl() -> u64 {
    DEFAULT_OTP_TTL_SECS
}

impl OtpSettings {
    /// Validates the OTP settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(4..=10).contains(&self.digits) {
            return Err(ConfigError::out_of_range(
                "security.otp.digits",
                self.digits,
                4,
                10,
            ));
        }
        if self.ttl_secs == 0 {
            return Err(ConfigError::validation("security.otp.ttl_secs", "cannot be zero"));
        }
        Ok(())
    }
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            digits: default_otp_digits(),
            ttl_secs: DEFAULT_OTP_TTL_SECS,
        }
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Cache TTLs and per-call deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Deadline for every cache call. Slower calls count as misses.
    #[serde(default = "default_cache_timeout")]
    pub operation_timeout_ms: u64,

    /// TTL of cached user profiles.
    #[serde(default = "default_user_ttl")]
    pub user_ttl_secs: u64,

    /// TTL of cached permission snapshots.
    #[serde(default = "default_permissions_ttl")]
    pub permissions_ttl_secs: u64,

    /// TTL of cached roles.
    #[serde(default = "default_roles_ttl")]
    pub roles_ttl_secs: u64,

    /// TTL of cached user listings.
    #[serde(default = "default_list_ttl")]
    pub list_ttl_secs: u64,

    /// Record Prometheus metrics.
    #[serde(default)]
    pub metrics_enabled: bool,
}

fn default_cache_timeout() -> u64 {
    DEFAULT_CACHE_TIMEOUT_MS
}

fn default_session_timeout() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_user_ttl() -> u64 {
    DEFAULT_USER_TTL_SECS
}

fn default_permissions_ttl() -> u64 {
    DEFAULT_PERMISSIONS_TTL_SECS
}

fn default_roles_ttl() -> u64 {
    DEFAULT_ROLES_TTL_SECS
}

fn default_list_ttl() -> u64 {
    DEFAULT_LIST_TTL_SECS
}

impl CacheSettings {
    /// Validates the cache settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "cache.operation_timeout_ms",
                "cannot be zero",
            ));
        }
        for (field, ttl) in [
            ("cache.user_ttl_secs", self.user_ttl_secs),
            ("cache.permissions_ttl_secs", self.permissions_ttl_secs),
            ("cache.roles_ttl_secs", self.roles_ttl_secs),
            ("cache.list_ttl_secs", self.list_ttl_secs),
        ] {
            if ttl == 0 {
                return Err(ConfigError::validation(field, "cannot be zero"));
            }
        }
        Ok(())
    }

    /// Returns the per-call deadline.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_CACHE_TIMEOUT_MS,
            user_ttl_secs: DEFAULT_USER_TTL_SECS,
            permissions_ttl_secs: DEFAULT_PERMISSIONS_TTL_SECS,
            roles_ttl_secs: DEFAULT_ROLES_TTL_SECS,
            list_ttl_secs: DEFAULT_LIST_TTL_SECS,
            metrics_enabled: false,
        }
    }
}

/// Session store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    /// Deadline for every session store call. Slower calls fail.
    #[serde(default = "default_session_timeout")]
    pub operation_timeout_ms: u64,
}

impl SessionSettings {
    /// Validates the session settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "session.operation_timeout_ms",
                "cannot be zero",
            ));
        }
        Ok(())
    }

    /// Returns the per-call deadline.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Authorization
// =============================================================================

/// Authorization settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// How token snapshots combine with live role data.
    #[serde(default)]
    pub policy: PermissionPolicy,
}

/// How token snapshots combine with live role data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Snapshot or live role permissions.
    #[default]
    Union,
    /// Snapshot only.
    TokenOnly,
    /// Live role permissions only.
    LiveOnly,
}

impl PermissionPolicy {
    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionPolicy::Union => "union",
            PermissionPolicy::TokenOnly => "token_only",
            PermissionPolicy::LiveOnly => "live_only",
        }
    }
}

impl std::str::FromStr for PermissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "union" => Ok(PermissionPolicy::Union),
            "token_only" | "token" => Ok(PermissionPolicy::TokenOnly),
            "live_only" | "live" => Ok(PermissionPolicy::LiveOnly),
            other => Err(format!("unknown permission policy: {}", other)),
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Background email queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Queue name.
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Attempts per job, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Base of the exponential backoff.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Jobs processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Jobs buffered before enqueue fails.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_queue() -> String {
    DEFAULT_EMAIL_QUEUE.to_string()
}

fn default_attempts() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    3000
}

fn default_concurrency() -> usize {
    5
}

fn default_capacity() -> usize {
    1024
}

impl DispatcherConfig {
    /// Validates the dispatcher settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue.trim().is_empty() {
            return Err(ConfigError::validation("dispatcher.queue", "cannot be empty"));
        }
        if self.attempts == 0 {
            return Err(ConfigError::validation("dispatcher.attempts", "cannot be zero"));
        }
        if self.concurrency == 0 || self.capacity == 0 {
            return Err(ConfigError::validation(
                "dispatcher",
                "concurrency and capacity must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue: default_queue(),
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            concurrency: default_concurrency(),
            capacity: default_capacity(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable.
    #[default]
    Text,
    /// Compact single-line.
    Compact,
    /// JSON for log shippers.
    Json,
}

// =============================================================================
// Secret Value
// =============================================================================

/// A secret that never shows up in `Display` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Creates a new secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no secret is set.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretValue({})", REDACTED)
    }
}
