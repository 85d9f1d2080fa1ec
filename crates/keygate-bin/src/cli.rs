// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `validate`: Validate configuration and assemble the services once
//! - `version`: Show version information
//! - `check-token`: Verify an access token and print its snapshot

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// keygate - role-based access control and session management
#[derive(Parser, Debug)]
#[command(
    name = "keygate",
    author = "Sylvex <contact@sylvex.io>",
    version = keygate_core::VERSION,
    about = "Role-based access control and session management",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (defaults and KEYGATE_* variables when absent)
    #[arg(short, long, env = "KEYGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "KEYGATE_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    #[allow(missing_docs)]
    pub command: Commands,
}

/// keygate subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate the configuration
    ///
    /// Parses and validates the configuration, then assembles every service
    /// over in-memory backends to prove the settings are usable.
    Validate(ValidateArgs),

    /// Print crate versions and build target
    Version,

    /// Verify an access token
    ///
    /// Prints the subject, role and permission snapshot carried by the token.
    #[command(name = "check-token")]
    CheckToken(CheckTokenArgs),
}

/// `keygate validate`
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Print the parsed configuration with secrets redacted
    #[arg(short, long)]
    pub show_config: bool,

    /// Result format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Fail when any warning is raised
    #[arg(long)]
    pub strict: bool,
}

/// `keygate check-token`
#[derive(Args, Debug, Clone)]
pub struct CheckTokenArgs {
    /// Access token, with or without a `Bearer ` prefix
    pub token: String,

    /// Result format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Multi-field text
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Single-line text
    Compact,
}

impl From<keygate_config::LogFormat> for LogFormat {
    fn from(format: keygate_config::LogFormat) -> Self {
        match format {
            keygate_config::LogFormat::Text => LogFormat::Text,
            keygate_config::LogFormat::Json => LogFormat::Json,
            keygate_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// How a command prints its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// For people
    #[default]
    Text,
    /// For scripts
    Json,
}

impl Cli {
    /// Parses `std::env::args`.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level after `--quiet` and `--verbose` are applied.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}
