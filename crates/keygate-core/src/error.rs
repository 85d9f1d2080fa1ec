// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error hierarchy for the authorization core.
//!
//! # Error Taxonomy
//!
//! ```text
//! CoreError
//! ├── NotFound / RoleNotFound    - 404, never retried
//! ├── Conflict                   - 409, caller may ignore or branch
//! ├── InvalidInput               - 400 with field detail
//! ├── MissingRoleReference       - data integrity, fatal, logged loudly
//! ├── Store                      - source of truth unavailable, fatal
//! └── Dispatch                   - task could not be queued
//! ```
//!
//! Cache failures never appear here. They are absorbed by the cache layer
//! and downgraded to misses.

use thiserror::Error;

use crate::types::{RoleId, UserId};

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// CoreError
// =============================================================================

/// Errors produced by the domain model, store and resolvers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of record (`user`, `permission`, ...).
        resource: &'static str,
        /// Identifier or lookup key used.
        id: String,
    },

    /// The role referenced by a lookup does not exist.
    #[error("Role not found: {role_id}")]
    RoleNotFound {
        /// The missing role.
        role_id: RoleId,
    },

    /// A uniqueness rule would be violated.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// A caller-supplied value is unacceptable.
    #[error("Invalid value for '{field}': {message}")]
    InvalidInput {
        /// Field that failed.
        field: String,
        /// Why it failed.
        message: String,
    },

    /// A user record carries no resolvable role.
    #[error("User {user_id} is missing a role reference")]
    MissingRoleReference {
        /// The corrupt user record.
        user_id: UserId,
    },

    /// The durable store failed.
    #[error("Store error during {operation}: {message}")]
    Store {
        /// Operation being attempted.
        operation: &'static str,
        /// Backend error message.
        message: String,
    },

    /// The task dispatcher refused a job.
    #[error("Dispatch error: {message}")]
    Dispatch {
        /// Reason given by the dispatcher.
        message: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Creates a role-not-found error.
    pub fn role_not_found(role_id: RoleId) -> Self {
        Self::RoleNotFound { role_id }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing-role-reference error.
    pub fn missing_role_reference(user_id: UserId) -> Self {
        Self::MissingRoleReference { user_id }
    }

    /// Creates a store error.
    pub fn store(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Store {
            operation,
            message: message.into(),
        }
    }

    /// Creates a dispatch error.
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code equivalent.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::RoleNotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::InvalidInput { .. } => 400,
            Self::MissingRoleReference { .. } => 500,
            Self::Store { .. } | Self::Dispatch { .. } => 503,
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::RoleNotFound { .. } => "role_not_found",
            Self::Conflict { .. } => "conflict",
            Self::InvalidInput { .. } => "invalid_input",
            Self::MissingRoleReference { .. } => "data_integrity",
            Self::Store { .. } => "store",
            Self::Dispatch { .. } => "dispatch",
        }
    }

    /// Returns `true` for transient infrastructure failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Dispatch { .. })
    }

    /// Returns `true` if the error indicates corrupt stored data.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, Self::MissingRoleReference { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================
