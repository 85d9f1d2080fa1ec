// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tokens and authorization.
//!
//! This module provides:
//! - Access and refresh claims
//! - JWT issuing and verification
//! - The per-request authentication context
//! - The union-policy authorizer

mod authorizer;
mod claims;
mod context;
mod jwt;

pub use authorizer::{Authorizer, Requirement, SnapshotPolicy, PERMISSION_DENIED};
pub use claims::{AccessClaims, RefreshClaims};
pub use context::AuthContext;
pub use jwt::{JwtConfig, JwtManager, TokenError};
