// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # keygate-config
//!
//! Configuration schema and loader for keygate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use keygate_config::loader::load_config;
//!
//! let config = load_config("keygate.yaml").unwrap();
//! println!("Policy: {}", config.authorization.policy.as_str());
//! ```
//!
//! ## Configuration Schema
//!
//! - `service` - Service name and environment label
//! - `security` - JWT secrets and lifetimes, password and OTP rules
//! - `cache` - Cache TTLs and the per-call deadline
//! - `session` - Session store deadline
//! - `authorization` - Snapshot policy (`union`, `token_only`, `live_only`)
//! - `dispatcher` - Email queue retry settings
//! - `logging` - Level and format
//!
//! Values in config files can reference environment variables:
//!
//! ```yaml
//! security:
//!   jwt:
//!     access_secret: "${JWT_ACCESS_SECRET}"
//!     refresh_secret: "${JWT_REFRESH_SECRET}"
//! logging:
//!   level: "${LOG_LEVEL:info}"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder, EnvLookup,
    DEFAULT_ENV_PREFIX,
};
pub use schema::{
    AuthorizationConfig, CacheSettings, DispatcherConfig, JwtSettings, KeygateConfig, LogFormat,
    LogLevel, LoggingConfig, OtpSettings, PasswordSettings, PermissionPolicy, SecretValue,
    SecurityConfig, ServiceConfig, SessionSettings,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
