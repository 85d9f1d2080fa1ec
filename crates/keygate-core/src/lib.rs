// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # keygate-core
//!
//! Domain model and permission pipeline for keygate.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────────┐
//! │  AuthStore   │──▶│ PermissionResolver │──▶│    aggregator    │
//! │ (durable)    │   │ role → codes       │   │ role ∪ overrides │
//! └──────────────┘   └────────────────────┘   └──────────────────┘
//!                              ▲
//!                              │ per-call
//!                    ┌─────────┴──────────┐
//!                    │ RolePermissionMemo │
//!                    └────────────────────┘
//! ```
//!
//! Caching, sessions and credentials live in `keygate-cache` and
//! `keygate-auth`; this crate has no knowledge of either.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod aggregator;
pub mod dispatch;
pub mod error;
pub mod memory;
pub mod model;
pub mod resolver;
pub mod store;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregator::{attach_effective_permissions, attach_effective_permissions_many, EnrichedUser};
pub use dispatch::{
    ChannelDispatcher, EmailJob, JobEnvelope, NoopDispatcher, RetryPolicy, TaskDispatcher,
    EMAIL_QUEUE,
};
pub use error::{CoreError, CoreResult};
pub use memory::MemoryStore;
pub use model::{
    OtpChallenge, Permission, Role, RolePermission, RoleRef, RoleWithPermissions, User,
    UserProfile, ADMIN_ROLE, APPROVAL_REQUIRED_ROLES,
};
pub use resolver::{
    PermissionResolver, RolePermissionMemo, RolePermissionSource, RolePermissions,
};
pub use store::{AuthStore, UserPage, UserQuery};
pub use types::{
    ApprovalStatus, PermissionCode, PermissionId, PermissionSet, RoleId, RolePermissionId, UserId,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
