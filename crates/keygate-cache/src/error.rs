// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Cache error types.

use std::time::Duration;
use thiserror::Error;

/// Result alias for raw cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by a cache backend.
///
/// Business code never sees these directly: [`crate::CacheGuard`] converts
/// them into misses. Only the session manager inspects them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("Cache backend unavailable: {message}")]
    Unavailable {
        /// Backend message.
        message: String,
    },

    /// The operation exceeded its deadline.
    #[error("Cache operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// A value could not be encoded or decoded.
    #[error("Cache serialization error for key '{key}': {message}")]
    Serialization {
        /// Affected key.
        key: String,
        /// Codec message.
        message: String,
    },

    /// A glob pattern was rejected.
    #[error("Invalid cache key pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern.
        pattern: String,
        /// Parser message.
        message: String,
    },
}

impl CacheError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }

    /// Creates a serialization error.
    pub fn serialization(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Returns the error type as a string for logging and metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Serialization { .. } => "serialization",
            Self::InvalidPattern { .. } => "invalid_pattern",
        }
    }
}
