// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while loading and validating a [`KeygateConfig`].
//!
//! Field names are dotted paths into the document (`security.jwt.issuer`),
//! so an operator can find the offending key directly.
//!
//! [`KeygateConfig`]: crate::KeygateConfig

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the loader.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration was refused.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document at `path` is not valid YAML, TOML or JSON for the schema.
    #[error("Cannot parse '{path}': {message}")]
    Parse {
        /// Source document.
        path: PathBuf,
        /// Deserializer message.
        message: String,
    },

    /// A document parsed from memory did not match the schema.
    #[error("Malformed configuration: {message}")]
    Serialization {
        /// Deserializer message.
        message: String,
    },

    /// A setting has a value that is refused.
    #[error("Invalid setting '{field}': {message}")]
    Validation {
        /// Dotted path of the setting.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A numeric setting lies outside its accepted range.
    #[error("Setting '{field}' = {value} is outside {min}..={max}")]
    OutOfRange {
        /// Dotted path of the setting.
        field: String,
        /// Rejected value.
        value: String,
        /// Lowest accepted value.
        min: String,
        /// Highest accepted value.
        max: String,
    },

    /// A setting without a default was not provided.
    #[error("Required setting '{field}' is not set")]
    MissingField {
        /// Dotted path of the setting.
        field: String,
    },

    /// A `KEYGATE_*` override could not be applied.
    #[error("Environment override {name} rejected: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Why the value was refused.
        message: String,
    },

    /// The configuration file does not exist.
    #[error("Configuration file '{path}' does not exist")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    #[error("Cannot read '{path}': {source}")]
    Io {
        /// Requested path.
        path: PathBuf,
        /// Read failure.
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not one of yaml, yml, toml or json.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The extension found.
        format: String,
    },
}

impl ConfigError {
    /// Parse failure for the document at `path`.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Schema mismatch in an in-memory document.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Refused value for `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// `value` of `field` outside `min..=max`.
    pub fn out_of_range<T: std::fmt::Display>(
        field: impl Into<String>,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// `field` has no value and no default.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Refused environment override.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Missing configuration file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unreadable configuration file.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Unknown file extension.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// `true` when a JWT secret is missing or unusable.
    pub fn is_credential_error(&self) -> bool {
        match self {
            Self::Validation { field, .. } | Self::MissingField { field } => {
                field.contains("secret")
            }
            _ => false,
        }
    }

    /// Short tag for log fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Serialization { .. } => "serialization",
            Self::Validation { .. } => "validation",
            Self::OutOfRange { .. } => "out_of_range",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidEnvVar { .. } => "invalid_env_var",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Io { .. } => "io",
            Self::UnsupportedFormat { .. } => "unsupported_format",
        }
    }
}
