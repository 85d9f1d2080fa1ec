// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # keygate-auth
//!
//! Credentials, sessions, authorization and account services for keygate.
//!
//! - [`auth`]: access/refresh tokens and the union-policy [`Authorizer`]
//! - [`session`]: single-device sessions with strict store semantics
//! - [`services`]: registration, login, user and role administration
//! - [`middleware`]: tower layers guarding protected routes
//!
//! All services are assembled once through [`AppState::builder`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod services;
pub mod session;
pub mod state;

pub use auth::{
    AccessClaims, AuthContext, Authorizer, JwtConfig, JwtManager, RefreshClaims, Requirement,
    SnapshotPolicy, TokenError, PERMISSION_DENIED,
};
pub use config::AuthConfig;
pub use error::{ApiError, ApiResult, FieldError, ValidationErrors};
pub use extractors::{Auth, ListUsersQuery, OptionalAuth, RequestId, ValidatedJson};
pub use middleware::{AuthLayer, RequireLayer};
pub use otp::{OtpConfig, OtpIssuer};
pub use password::{Argon2Hasher, PasswordHasher, PasswordPolicy};
pub use services::{AuthService, Mailer, RoleAdminService, ServiceContext, UserAdminService};
pub use session::{Session, SessionConfig, SessionError, SessionManager, SessionResult};
pub use state::{AppState, AppStateBuilder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
