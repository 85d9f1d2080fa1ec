// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `validate`: Validate configuration and assemble the services
//! - `version`: Show version information
//! - `check-token`: Verify an access token

mod check_token;
mod validate;
mod version;

pub use check_token::check_token;
pub use validate::{collect_warnings, validate};
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::CheckToken(args) => check_token::check_token(&cli, args),
    }
}
