// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for keygate.
//!
//! # Loading Pipeline
//!
//! 1. Read the YAML, TOML or JSON file
//! 2. Resolve `${VAR}` and `${VAR:default}` placeholders
//! 3. Deserialize into [`KeygateConfig`]
//! 4. Apply `KEYGATE_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! KEYGATE_JWT_ACCESS_SECRET=...
//! KEYGATE_JWT_REFRESH_SECRET=...
//! KEYGATE_ACCESS_TTL_SECS=900
//! KEYGATE_REFRESH_TTL_SECS=604800
//! KEYGATE_CACHE_TIMEOUT_MS=250
//! KEYGATE_LOG_LEVEL=debug
//! KEYGATE_PERMISSION_POLICY=union
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{KeygateConfig, LogLevel, PermissionPolicy, SecretValue};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "KEYGATE";

/// Looks up an environment variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env() -> EnvLookup {
    Arc::new(|name| std::env::var(name).ok())
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for keygate.
///
/// # Examples
///
/// ```no_run
/// use keygate_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("keygate.yaml").unwrap();
/// ```
#[derive(Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
    validate: bool,
    env: EnvLookup,
}

impl ConfigLoader {
    /// Creates a loader that reads the process environment.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            validate: true,
            env: process_env(),
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables validation of the result.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Replaces the environment with `lookup`.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<KeygateConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let config = self.parse_content(&content, format, path)?;

        self.finish(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<KeygateConfig> {
        let content = self.expand(content);
        let config = parse_str(&content, format)?;
        self.finish(config)
    }

    /// Loads from `path` when given, otherwise from defaults and the environment.
    pub fn load_optional(&self, path: Option<&Path>) -> ConfigResult<KeygateConfig> {
        match path {
            Some(path) => self.load(path),
            None => {
                debug!("No configuration file given, using defaults");
                self.finish(KeygateConfig::default())
            }
        }
    }

    fn finish(&self, mut config: KeygateConfig) -> ConfigResult<KeygateConfig> {
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if self.validate {
            config.validate()?;
        }
        debug!(
            policy = config.authorization.policy.as_str(),
            access_ttl_secs = config.security.jwt.access_ttl_secs,
            "Configuration ready"
        );
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<KeygateConfig> {
        let content = self.expand(content);

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    fn expand(&self, content: &str) -> String {
        if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        }
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// Unknown variables without a default are left in place.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match ((self.env)(var_name), default_value) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!("Environment variable '{}' not found", var_name);
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        result
    }

    fn var(&self, suffix: &str) -> (String, Option<String>) {
        let name = format!("{}_{}", self.env_prefix, suffix);
        let value = (self.env)(&name).filter(|v| !v.trim().is_empty());
        (name, value)
    }

    fn apply_env_overrides(&self, config: &mut KeygateConfig) -> ConfigResult<()> {
        let jwt = &mut config.security.jwt;

        if let (_, Some(value)) = self.var("JWT_ACCESS_SECRET") {
            jwt.access_secret = SecretValue::new(value);
        }
        if let (_, Some(value)) = self.var("JWT_REFRESH_SECRET") {
            jwt.refresh_secret = SecretValue::new(value);
        }
        if let (name, Some(value)) = self.var("ACCESS_TTL_SECS") {
            jwt.access_ttl_secs = parse_number(&name, &value)?;
        }
        if let (name, Some(value)) = self.var("REFRESH_TTL_SECS") {
            jwt.refresh_ttl_secs = parse_number(&name, &value)?;
        }
        if let (name, Some(value)) = self.var("CACHE_TIMEOUT_MS") {
            config.cache.operation_timeout_ms = parse_number(&name, &value)?;
        }
        if let (name, Some(value)) = self.var("LOG_LEVEL") {
            config.logging.level = parse_log_level(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected a log level"))?;
        }
        if let (name, Some(value)) = self.var("PERMISSION_POLICY") {
            config.authorization.policy = PermissionPolicy::from_str(&value)
                .map_err(|message| ConfigError::invalid_env_var(name, message))?;
        }
        if let (_, Some(value)) = self.var("CACHE_METRICS") {
            config.cache.metrics_enabled = parse_bool(&value);
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("env_prefix", &self.env_prefix)
            .field("resolve_env_vars", &self.resolve_env_vars)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Default)]
pub struct ConfigLoaderBuilder {
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    validate: Option<bool>,
    env: Option<EnvLookup>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Enables or disables validation.
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = Some(enabled);
        self
    }

    /// Sets the environment lookup.
    pub fn env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env = Some(lookup);
        self
    }

    /// Builds the ConfigLoader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();

        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(resolve_env_vars) = self.resolve_env_vars {
            loader.resolve_env_vars = resolve_env_vars;
        }
        if let Some(validate) = self.validate {
            loader.validate = validate;
        }
        if let Some(env) = self.env {
            loader.env = env;
        }

        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<KeygateConfig> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env_var(name, "expected a number"))
}

/// Parses a string to bool.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// Parses a log level string.
fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

/// YAML goes through the config crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<KeygateConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<KeygateConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> ConfigLoader {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigLoader::new().with_env_lookup(move |name| vars.get(name).cloned())
    }

    fn create_test_yaml() -> String {
        r#"
service:
  name: keygate-test
security:
  jwt:
    access_secret: "access-secret-0123456789"
    refresh_secret: "refresh-secret-0123456789"
    access_ttl_secs: 600
  otp:
    digits: 6
cache:
  operation_timeout_ms: 500
authorization:
  policy: token_only
logging:
  level: debug
  format: json
"#
        .to_string()
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(create_test_yaml().as_bytes()).unwrap();

        let config = env(&[]).load(file.path()).unwrap();
        assert_eq!(config.service.name, "keygate-test");
        assert_eq!(config.security.jwt.access_ttl_secs, 600);
        assert_eq!(config.cache.operation_timeout_ms, 500);
        assert_eq!(config.authorization.policy, PermissionPolicy::TokenOnly);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[security.jwt]
access_secret = "access-secret-0123456789"
refresh_secret = "refresh-secret-0123456789"

[dispatcher]
attempts = 3
"#;
        let config = env(&[]).load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.dispatcher.attempts, 3);
        assert_eq!(config.dispatcher.queue, "email-queue");
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("keygate.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("keygate.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("keygate.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("keygate")).is_err());
    }

    #[test]
    fn test_env_placeholder_resolution() {
        let loader = env(&[("KG_TEST_SECRET", "from-env")]);
        let resolved = loader.resolve_env_placeholders("secret: ${KG_TEST_SECRET}");
        assert_eq!(resolved, "secret: from-env");
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let loader = env(&[]);
        assert_eq!(
            loader.resolve_env_placeholders("level: ${KG_MISSING:warn}"),
            "level: warn"
        );
        assert_eq!(
            loader.resolve_env_placeholders("level: ${KG_MISSING}"),
            "level: ${KG_MISSING}"
        );
        assert_eq!(loader.resolve_env_placeholders("broken ${OPEN"), "broken ${OPEN");
    }

    #[test]
    fn test_env_overrides() {
        let loader = env(&[
            ("KEYGATE_JWT_ACCESS_SECRET", "override-access-0123456789"),
            ("KEYGATE_REFRESH_TTL_SECS", "7200"),
            ("KEYGATE_CACHE_TIMEOUT_MS", "400"),
            ("KEYGATE_LOG_LEVEL", "WARN"),
            ("KEYGATE_PERMISSION_POLICY", "live_only"),
        ]);
        let config = loader
            .load_from_str(&create_test_yaml(), ConfigFormat::Yaml)
            .unwrap();

        assert_eq!(
            config.security.jwt.access_secret.expose(),
            "override-access-0123456789"
        );
        assert_eq!(config.security.jwt.refresh_ttl_secs, 7200);
        assert_eq!(config.cache.operation_timeout_ms, 400);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.authorization.policy, PermissionPolicy::LiveOnly);
    }

    #[test]
    fn test_invalid_env_override() {
        let loader = env(&[("KEYGATE_ACCESS_TTL_SECS", "soon")]);
        let err = loader
            .load_from_str(&create_test_yaml(), ConfigFormat::Yaml)
            .unwrap_err();
        assert_eq!(err.error_type(), "invalid_env_var");
    }

    #[test]
    fn test_load_optional_from_env_only() {
        let loader = env(&[
            ("KEYGATE_JWT_ACCESS_SECRET", "env-access-0123456789"),
            ("KEYGATE_JWT_REFRESH_SECRET", "env-refresh-0123456789"),
        ]);
        let config = loader.load_optional(None).unwrap();
        assert_eq!(config.service.name, "keygate");

        assert!(env(&[]).load_optional(None).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("ON"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("maybe"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "security:\n  jwt:\n    secret: x\n";
        let err = env(&[]).load_from_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert_eq!(err.error_type(), "serialization");
    }

    #[test]
    fn test_loader_builder() {
        let loader = ConfigLoader::builder()
            .env_prefix("KG")
            .validate(false)
            .build();
        let config = loader.load_from_str("{}", ConfigFormat::Json).unwrap();
        assert!(config.security.jwt.access_secret.is_empty());
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/path/keygate.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
