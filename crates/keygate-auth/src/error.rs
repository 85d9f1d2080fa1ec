// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request-boundary error type.
//!
//! Every service operation returns [`ApiResult`]. Errors keep their status
//! code and optional field-level details until they are serialized, at which
//! point they become:
//!
//! ```json
//! { "error": { "code": "BAD_REQUEST", "message": "Invalid password",
//!              "details": { "fields": [{ "field": "password", "message": "Invalid password" }] } } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keygate_core::CoreError;

use crate::auth::TokenError;
use crate::session::SessionError;

/// Result type alias for service operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ApiError
// =============================================================================

/// Why a service operation was refused, with its HTTP mapping.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// User, role or permission does not exist (404).
    #[error("Not found: {message}")]
    NotFound {
        /// Shown to the caller.
        message: String,
        /// Per-field details.
        errors: Option<ValidationErrors>,
    },

    /// Input refused before any state changed (400).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Shown to the caller.
        message: String,
        /// Per-field details.
        errors: Option<ValidationErrors>,
    },

    /// Missing, invalid or expired credential (401).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Shown to the caller.
        message: String,
    },

    /// Authenticated but not allowed (403).
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Shown to the caller.
        message: String,
    },

    /// Duplicate email, mapping or repeated state change (409).
    #[error("Conflict: {message}")]
    Conflict {
        /// Shown to the caller.
        message: String,
    },

    /// Stored data violates an invariant (500).
    #[error("Data integrity violation: {message}")]
    DataIntegrity {
        /// Logged only.
        message: String,
    },

    /// A required backend is unreachable (503).
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Logged only.
        message: String,
    },

    /// Token signing or another local failure (500).
    #[error("Internal error: {message}")]
    Internal {
        /// Logged only.
        message: String,
    },
}

impl ApiError {
    /// 404.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            errors: None,
        }
    }

    /// 400.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            errors: None,
        }
    }

    /// 401.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// 403.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// 409.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// 500, for stored data that breaks an invariant.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            message: message.into(),
        }
    }

    /// 503.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// 500.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attaches a field error. Ignored by variants without field details.
    pub fn with_field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        if let Self::NotFound { errors, .. } | Self::BadRequest { errors, .. } = &mut self {
            errors.get_or_insert_with(ValidationErrors::new).add(field, message);
        }
        self
    }

    /// HTTP status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::DataIntegrity { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable code of the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::DataIntegrity { .. } => "DATA_INTEGRITY",
            ApiError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Message of the response body. Server errors never leak their cause.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotFound { message, .. }
            | ApiError::BadRequest { message, .. }
            | ApiError::Unauthorized { message }
            | ApiError::Forbidden { message }
            | ApiError::Conflict { message } => message.clone(),
            ApiError::ServiceUnavailable { .. } => {
                "Service temporarily unavailable".to_string()
            }
            ApiError::DataIntegrity { .. } | ApiError::Internal { .. } => {
                "Internal server error".to_string()
            }
        }
    }

    /// Field-level details, if any.
    pub fn field_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ApiError::NotFound { errors, .. } | ApiError::BadRequest { errors, .. } => {
                errors.as_ref()
            }
            _ => None,
        }
    }

    /// `true` for 5xx.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// =============================================================================
// Response
// =============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = error_code, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = error_code, status = status.as_u16(), "Request refused");
        }

        let body = ErrorResponseBody {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.user_message(),
                details: self
                    .field_errors()
                    .and_then(|errors| serde_json::to_value(errors).ok()),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// `{ "error": { ... } }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    /// The refusal.
    pub error: ErrorDetails,
}

/// Body of a refused request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// See [`ApiError::error_code`].
    pub code: String,
    /// See [`ApiError::user_message`].
    pub message: String,
    /// Field errors, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// =============================================================================
// Field errors
// =============================================================================

/// Input problems collected before a request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationErrors {
    /// In the order they were found.
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    /// No problems yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a problem with `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the message recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.message.as_str())
    }

    /// `success` when nothing was recorded, otherwise a 400 carrying every problem.
    pub fn into_result<T>(self, success: T) -> ApiResult<T> {
        if self.is_empty() {
            Ok(success)
        } else {
            Err(ApiError::BadRequest {
                message: "Validation failed".to_string(),
                errors: Some(self),
            })
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} validation errors", self.fields.len())
    }
}

/// One input problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Request field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

// =============================================================================
// Conversions
// =============================================================================

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { resource, .. } => {
                ApiError::not_found(format!("{} not found", capitalize(resource)))
            }
            CoreError::RoleNotFound { .. } => ApiError::not_found("Role not found"),
            CoreError::Conflict { message } => ApiError::conflict(message),
            CoreError::InvalidInput { field, message } => {
                ApiError::bad_request(message.clone()).with_field_error(field, message)
            }
            e @ CoreError::MissingRoleReference { .. } => ApiError::data_integrity(e.to_string()),
            e @ (CoreError::Store { .. } | CoreError::Dispatch { .. }) => {
                ApiError::service_unavailable(e.to_string())
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::unauthorized("Token expired"),
            TokenError::Invalid { .. } => ApiError::unauthorized("Invalid token"),
            e @ (TokenError::Signing { .. } | TokenError::Configuration { .. }) => {
                ApiError::internal(e.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound { .. } => ApiError::unauthorized("Session invalid"),
            e @ SessionError::StoreUnavailable { .. } => {
                ApiError::service_unavailable(e.to_string())
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================
