// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `check-token` command.

use keygate_auth::{AccessClaims, JwtManager};

use crate::cli::{CheckTokenArgs, Cli, OutputFormat};
use crate::error::BinResult;
use crate::runtime::Runtime;

/// Verifies an access token against the configured secret and prints what it
/// carries.
pub fn check_token(cli: &Cli, args: CheckTokenArgs) -> BinResult<()> {
    let runtime = Runtime::load(cli.config.as_deref())?;
    let claims = inspect(&runtime.jwt_manager()?, &args.token)?;

    match args.format {
        OutputFormat::Text => {
            println!("✓ Token is valid");
            println!();
            println!("  Subject:     {}", claims.sub);
            println!("  Role:        {} ({})", claims.role, claims.role_id);
            println!("  Issuer:      {}", claims.iss);
            if let Some(expires_at) = claims.expires_at() {
                println!("  Expires at:  {}", expires_at.to_rfc3339());
            }
            println!("  Permissions: {}", claims.permissions.len());
            for code in claims.permissions.iter() {
                println!("    - {}", code);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "claims": claims,
                "expires_at": claims.expires_at().map(|t| t.to_rfc3339()),
            });
            let rendered = serde_json::to_string_pretty(&output)?;
            println!("{}", rendered);
        }
    }

    Ok(())
}

/// Verifies `token` and returns its claims.
pub fn inspect(jwt: &JwtManager, token: &str) -> BinResult<AccessClaims> {
    let token = token.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    Ok(jwt.verify_access(token)?)
}
