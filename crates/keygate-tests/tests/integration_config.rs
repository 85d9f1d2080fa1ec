// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! Loading configuration files, environment overrides, and assembling the
//! services from the result.
//!
//! ## Test Categories
//!
//! - `test_load_*`: File and string loading
//! - `test_env_*`: Environment overrides and placeholders
//! - `test_runtime_*`: Assembly from a loaded configuration

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use keygate_auth::SnapshotPolicy;
use keygate_bin::runtime::{auth_config, cache_config};
use keygate_bin::Runtime;
use keygate_config::{
    ConfigError, ConfigFormat, ConfigLoader, KeygateConfig, LogFormat, LogLevel, PermissionPolicy,
};
use keygate_tests::prelude::*;

/// A loader that sees only `pairs` as its environment.
fn loader(pairs: &[(&str, &str)]) -> ConfigLoader {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConfigLoader::new().with_env_lookup(move |name| vars.get(name).cloned())
}

fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_minimal_yaml_uses_defaults() {
    let file = write_temp(MINIMAL_YAML, ".yaml");
    let config = loader(&[]).load(file.path()).unwrap();

    assert_eq!(config.service.name, "keygate");
    assert_eq!(config.authorization.policy, PermissionPolicy::Union);
    assert_eq!(config.security.jwt.access_ttl_secs, 900);
    assert_eq!(config.security.jwt.refresh_ttl_secs, 604_800);
    assert_eq!(config.cache.operation_timeout_ms, 250);
    assert_eq!(config.dispatcher.queue, "email-queue");
    assert_eq!(config.dispatcher.attempts, 5);
}

#[test]
fn test_load_full_yaml() {
    let file = write_temp(FULL_YAML, ".yml");
    let config = loader(&[]).load(file.path()).unwrap();

    assert_eq!(config.service.name, "keygate-test");
    assert_eq!(config.service.environment, "staging");
    assert_eq!(config.security.jwt.issuer, "keygate-test");
    assert_eq!(config.security.jwt.leeway_secs, 5);
    assert_eq!(config.security.password.min_length, 10);
    assert_eq!(config.security.otp.digits, 8);
    assert_eq!(config.cache.list_ttl_secs, 15);
    assert!(config.cache.metrics_enabled);
    assert_eq!(config.session.operation_timeout_ms, 500);
    assert_eq!(config.authorization.policy, PermissionPolicy::LiveOnly);
    assert_eq!(config.dispatcher.capacity, 16);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_toml() {
    let file = write_temp(FULL_TOML, ".toml");
    let config = loader(&[]).load(file.path()).unwrap();

    assert_eq!(config.service.name, "keygate-test");
    assert_eq!(config.authorization.policy, PermissionPolicy::TokenOnly);
    assert_eq!(config.security.jwt.access_ttl_secs, 600);
}

#[test]
fn test_load_json_string() {
    let json = r#"{
        "security": {
            "jwt": {
                "access_secret": "json-access-secret-0123456789",
                "refresh_secret": "json-refresh-secret-0123456789"
            }
        },
        "authorization": { "policy": "live_only" }
    }"#;
    let config = loader(&[]).load_from_str(json, ConfigFormat::Json).unwrap();
    assert_eq!(config.authorization.policy, PermissionPolicy::LiveOnly);
}

#[test]
fn test_load_missing_file() {
    let err = loader(&[])
        .load("/nonexistent/keygate.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn test_load_unknown_extension() {
    let file = write_temp(MINIMAL_YAML, ".ini");
    assert!(loader(&[]).load(file.path()).is_err());
}

#[test]
fn test_load_rejects_unknown_fields() {
    let yaml = format!("{}\nextra_section:\n  enabled: true\n", MINIMAL_YAML);
    assert!(loader(&[]).load_from_str(&yaml, ConfigFormat::Yaml).is_err());
}

#[test]
fn test_load_rejects_shared_secrets() {
    let yaml = r#"
security:
  jwt:
    access_secret: "same-secret-0123456789"
    refresh_secret: "same-secret-0123456789"
"#;
    let err = loader(&[])
        .load_from_str(yaml, ConfigFormat::Yaml)
        .unwrap_err();
    assert!(err.is_credential_error());
}

#[test]
fn test_load_rejects_refresh_shorter_than_access() {
    let yaml = r#"
security:
  jwt:
    access_secret: "access-secret-0123456789"
    refresh_secret: "refresh-secret-0123456789"
    access_ttl_secs: 3600
    refresh_ttl_secs: 600
"#;
    assert!(loader(&[]).load_from_str(yaml, ConfigFormat::Yaml).is_err());
}

#[test]
fn test_load_missing_secrets() {
    let err = loader(&[])
        .load_from_str("service:\n  name: keygate\n", ConfigFormat::Yaml)
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { .. }));
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_env_overrides_win_over_file() {
    let file = write_temp(FULL_YAML, ".yaml");
    let config = loader(&[
        ("KEYGATE_PERMISSION_POLICY", "token_only"),
        ("KEYGATE_ACCESS_TTL_SECS", "300"),
        ("KEYGATE_CACHE_METRICS", "false"),
        ("KEYGATE_LOG_LEVEL", "error"),
    ])
    .load(file.path())
    .unwrap();

    assert_eq!(config.authorization.policy, PermissionPolicy::TokenOnly);
    assert_eq!(config.security.jwt.access_ttl_secs, 300);
    assert!(!config.cache.metrics_enabled);
    assert_eq!(config.logging.level, LogLevel::Error);
}

#[test]
fn test_env_only_configuration() {
    let config = loader(&[
        ("KEYGATE_JWT_ACCESS_SECRET", "env-access-secret-0123456789"),
        ("KEYGATE_JWT_REFRESH_SECRET", "env-refresh-secret-0123456789"),
    ])
    .load_optional(None)
    .unwrap();

    assert_eq!(
        config.security.jwt.access_secret.expose(),
        "env-access-secret-0123456789"
    );
}

#[test]
fn test_env_placeholders_in_file() {
    let yaml = r#"
security:
  jwt:
    access_secret: "${KG_ACCESS}"
    refresh_secret: "${KG_REFRESH:fallback-refresh-secret-0123}"
"#;
    let file = write_temp(yaml, ".yaml");
    let config = loader(&[("KG_ACCESS", "placeholder-access-secret-0123")])
        .load(file.path())
        .unwrap();

    assert_eq!(
        config.security.jwt.access_secret.expose(),
        "placeholder-access-secret-0123"
    );
    assert_eq!(
        config.security.jwt.refresh_secret.expose(),
        "fallback-refresh-secret-0123"
    );
}

#[test]
fn test_env_invalid_override() {
    let err = loader(&[("KEYGATE_PERMISSION_POLICY", "whatever")])
        .load_from_str(MINIMAL_YAML, ConfigFormat::Yaml)
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
}

#[test]
fn test_env_redacted_output_hides_secrets() {
    let config = loader(&[])
        .load_from_str(FULL_YAML, ConfigFormat::Yaml)
        .unwrap();
    let rendered = serde_json::to_string(&config.redacted()).unwrap();

    assert!(!rendered.contains("yaml-access-secret"));
    assert!(!rendered.contains("yaml-refresh-secret"));
    assert!(!format!("{:?}", config).contains("yaml-access-secret"));
}

// =============================================================================
// Runtime
// =============================================================================

fn full_config() -> KeygateConfig {
    loader(&[])
        .load_from_str(FULL_YAML, ConfigFormat::Yaml)
        .unwrap()
}

#[test]
fn test_runtime_conversion() {
    let config = full_config();

    let auth = auth_config(&config);
    assert_eq!(auth.policy, SnapshotPolicy::LiveOnly);
    assert_eq!(auth.jwt.access_ttl_secs, 600);
    assert_eq!(auth.session.ttl, Duration::from_secs(86_400));
    assert_eq!(auth.session.operation_timeout, Duration::from_millis(500));
    assert_eq!(auth.password.min_length, 10);
    assert_eq!(auth.otp.digits, 8);
    assert_eq!(auth.email_retry.attempts, 3);

    let cache = cache_config(&config);
    assert_eq!(cache.operation_timeout, Duration::from_millis(100));
    assert_eq!(cache.roles_ttl, Duration::from_secs(120));
    assert!(cache.metrics_enabled);
}

#[tokio::test]
async fn test_runtime_assembly_serves_requests() {
    init_test_logging();
    let assembly = Runtime::new(full_config()).assemble().unwrap();
    assert!(assembly.registry.is_some());

    let roles = assembly.state.roles.roles_with_permissions().await.unwrap();
    assert!(roles.is_empty());
    assert_eq!(assembly.state.authorizer.policy(), SnapshotPolicy::LiveOnly);
}

#[tokio::test]
async fn test_runtime_jwt_manager_matches_config() {
    let runtime = Runtime::new(full_config());
    let jwt = runtime.jwt_manager().unwrap();

    assert_eq!(jwt.issuer(), "keygate-test");
    assert_eq!(jwt.access_ttl(), Duration::from_secs(600));
}
