// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use keygate_config::{KeygateConfig, PermissionPolicy};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::Runtime;

/// Access token lifetime above which a warning is raised.
const LONG_ACCESS_TTL_SECS: i64 = 60 * 60;

/// Secret length recommended outside development.
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Executes the `validate` command.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let source = cli
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults and environment)".to_string());

    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(BinError::ConfigFileMissing(path.clone()));
        }
    }

    let runtime = Runtime::load(cli.config.as_deref())?;
    runtime
        .assemble()
        .map_err(|e| e.with_context("Configuration is valid but services failed to assemble"))?;

    let config = runtime.config();
    let warnings = collect_warnings(config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", source);
            println!();
            println!("Summary:");
            println!("  Service:       {} ({})", config.service.name, config.service.environment);
            println!("  Policy:        {}", config.authorization.policy.as_str());
            println!("  Access TTL:    {}s", config.security.jwt.access_ttl_secs);
            println!("  Refresh TTL:   {}s", config.security.jwt.refresh_ttl_secs);
            println!("  Cache timeout: {}ms", config.cache.operation_timeout_ms);
            println!("  Email queue:   {} (attempts {})", config.dispatcher.queue, config.dispatcher.attempts);

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                let rendered = serde_json::to_string_pretty(&config.redacted())?;
                println!();
                println!("Parsed configuration:");
                println!("{}", rendered);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_source": source,
                "summary": {
                    "service": config.service.name,
                    "environment": config.service.environment,
                    "policy": config.authorization.policy.as_str(),
                    "access_ttl_secs": config.security.jwt.access_ttl_secs,
                    "refresh_ttl_secs": config.security.jwt.refresh_ttl_secs,
                    "cache_timeout_ms": config.cache.operation_timeout_ms,
                    "metrics_enabled": config.cache.metrics_enabled,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(config.redacted()) } else { None },
            });
            let rendered = serde_json::to_string_pretty(&output)?;
            println!("{}", rendered);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::StrictWarnings(warnings.len()));
    }

    Ok(())
}

/// Settings that are accepted but probably not intended.
pub fn collect_warnings(config: &KeygateConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let jwt = &config.security.jwt;

    if config.authorization.policy == PermissionPolicy::TokenOnly {
        warnings.push(
            "Policy token_only: role revocations apply only after access tokens expire".to_string(),
        );
    }
    if jwt.access_ttl_secs > LONG_ACCESS_TTL_SECS {
        warnings.push(format!(
            "Access tokens live {}s; permission snapshots may go stale",
            jwt.access_ttl_secs
        ));
    }
    if config.service.environment != "development"
        && (jwt.access_secret.len() < RECOMMENDED_SECRET_LEN
            || jwt.refresh_secret.len() < RECOMMENDED_SECRET_LEN)
    {
        warnings.push(format!(
            "JWT secrets shorter than {} bytes outside development",
            RECOMMENDED_SECRET_LEN
        ));
    }
    if config.cache.operation_timeout_ms > config.session.operation_timeout_ms {
        warnings.push("Cache deadline exceeds the session store deadline".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_config::SecretValue;

    fn config() -> KeygateConfig {
        let mut config = KeygateConfig::default();
        config.security.jwt.access_secret = SecretValue::new("access-secret-0123456789");
        config.security.jwt.refresh_secret = SecretValue::new("refresh-secret-0123456789");
        config
    }

    #[test]
    fn test_defaults_have_no_warnings() {
        assert!(collect_warnings(&config()).is_empty());
    }

    #[test]
    fn test_warnings() {
        let mut config = config();
        config.authorization.policy = PermissionPolicy::TokenOnly;
        config.security.jwt.access_ttl_secs = 7200;
        config.service.environment = "production".to_string();

        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("token_only"));
    }
}
