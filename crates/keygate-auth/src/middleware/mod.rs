// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tower middleware for protected routes.
//!
//! - [`AuthLayer`]: access token verification
//! - [`RequireLayer`]: permission and role guard

mod auth;
mod rbac;

pub use auth::{extract_token, AuthLayer, AuthMiddleware, ACCESS_TOKEN_COOKIE};
pub use rbac::{RequireLayer, RequireMiddleware};
