// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the keygate binary.
//!
//! Every command returns [`BinResult`]; `main` reports the cause chain and
//! exits with [`BinError::exit_code`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for keygate-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors surfaced by the keygate commands.
#[derive(Debug, Error)]
pub enum BinError {
    /// The configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] keygate_config::ConfigError),

    /// `--config` points at nothing.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigFileMissing(PathBuf),

    /// `validate --strict` found warnings.
    #[error("Strict mode: {0} warning(s) found")]
    StrictWarnings(usize),

    /// A collaborator could not be constructed from valid settings.
    #[error("Service assembly failed: {0}")]
    Assembly(String),

    /// The auth layer refused to build.
    #[error(transparent)]
    Auth(#[from] keygate_auth::ApiError),

    /// Token rejected by `check-token`.
    #[error("Token rejected: {0}")]
    Token(#[from] keygate_auth::TokenError),

    /// Command output could not be rendered.
    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),

    /// Another error with a description of what was being attempted.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates an assembly error.
    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    /// Wraps the error with `context`.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Process exit code.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | configuration |
    /// | 2 | assembly |
    /// | 3 | token rejected |
    /// | 4 | output |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::ConfigFileMissing(_) | Self::StrictWarnings(_) => 1,
            Self::Assembly(_) | Self::Auth(_) => 2,
            Self::Token(_) => 3,
            Self::Output(_) => 4,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

/// Prints `error` and its causes to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports `error` and exits.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_config::ConfigError;

    #[test]
    fn test_context_keeps_exit_code() {
        let err = BinError::assembly("metrics registry").with_context("validate");
        assert_eq!(err.to_string(), "validate: Service assembly failed: metrics registry");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::from(ConfigError::missing_field("security.jwt.access_secret")).exit_code(), 1);
        assert_eq!(BinError::ConfigFileMissing(PathBuf::from("/nope.yaml")).exit_code(), 1);
        assert_eq!(BinError::StrictWarnings(2).exit_code(), 1);
        assert_eq!(BinError::from(keygate_auth::TokenError::Expired).exit_code(), 3);
    }

    #[test]
    fn test_missing_file_message() {
        let err = BinError::ConfigFileMissing(PathBuf::from("/etc/keygate.yaml"));
        assert_eq!(err.to_string(), "Configuration file not found: /etc/keygate.yaml");
    }
}
