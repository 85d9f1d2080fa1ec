// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service assembly.
//!
//! Turns a [`KeygateConfig`] into the per-crate settings and wires every
//! collaborator exactly once:
//!
//! - Store and cache backends (in-memory)
//! - Optional Prometheus cache metrics
//! - The email queue and the worker draining it
//! - The [`AppState`] holding every service

use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use keygate_auth::{
    AppState, AuthConfig, JwtConfig, JwtManager, OtpConfig, PasswordPolicy, SnapshotPolicy,
};
use keygate_cache::{CacheConfig, CacheMetrics};
use keygate_config::{ConfigLoader, KeygateConfig, PermissionPolicy};
use keygate_core::{ChannelDispatcher, JobEnvelope, RetryPolicy};

use crate::error::{BinError, BinResult};

// =============================================================================
// Config conversion
// =============================================================================

/// Token signing settings.
pub fn jwt_config(config: &KeygateConfig) -> JwtConfig {
    let jwt = &config.security.jwt;
    JwtConfig {
        access_secret: jwt.access_secret.expose().to_string(),
        refresh_secret: jwt.refresh_secret.expose().to_string(),
        issuer: jwt.issuer.clone(),
        access_ttl_secs: jwt.access_ttl_secs,
        refresh_ttl_secs: jwt.refresh_ttl_secs,
        leeway_secs: jwt.leeway_secs,
    }
}

/// Settings of the auth services.
pub fn auth_config(config: &KeygateConfig) -> AuthConfig {
    let security = &config.security;
    AuthConfig::new(jwt_config(config))
        .with_session_timeout(config.session.operation_timeout())
        .with_otp(OtpConfig {
            digits: security.otp.digits,
            ttl_secs: security.otp.ttl_secs,
        })
        .with_password_policy(PasswordPolicy {
            min_length: security.password.min_length,
        })
        .with_policy(snapshot_policy(config.authorization.policy))
        .with_email_retry(RetryPolicy {
            attempts: config.dispatcher.attempts,
            backoff_base_ms: config.dispatcher.backoff_ms,
        })
}

/// Cache TTLs and deadline.
pub fn cache_config(config: &KeygateConfig) -> CacheConfig {
    let cache = &config.cache;
    CacheConfig::builder()
        .operation_timeout(cache.operation_timeout())
        .user_ttl(Duration::from_secs(cache.user_ttl_secs))
        .permissions_ttl(Duration::from_secs(cache.permissions_ttl_secs))
        .roles_ttl(Duration::from_secs(cache.roles_ttl_secs))
        .list_ttl(Duration::from_secs(cache.list_ttl_secs))
        .metrics_enabled(cache.metrics_enabled)
        .build()
}

fn snapshot_policy(policy: PermissionPolicy) -> SnapshotPolicy {
    match policy {
        PermissionPolicy::Union => SnapshotPolicy::Union,
        PermissionPolicy::TokenOnly => SnapshotPolicy::TokenOnly,
        PermissionPolicy::LiveOnly => SnapshotPolicy::LiveOnly,
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// A validated configuration ready to be assembled.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: Arc<KeygateConfig>,
}

impl Runtime {
    /// Wraps an already loaded configuration.
    pub fn new(config: KeygateConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Loads the configuration at `path`, or from defaults and the
    /// environment when no path is given.
    pub fn load(path: Option<&std::path::Path>) -> BinResult<Self> {
        let config = ConfigLoader::new()
            .load_optional(path)
            .map_err(|e| BinError::from(e).with_context("Failed to load configuration"))?;
        Ok(Self::new(config))
    }

    /// The loaded configuration.
    pub fn config(&self) -> &KeygateConfig {
        &self.config
    }

    /// Token signer built from the configuration.
    pub fn jwt_manager(&self) -> BinResult<JwtManager> {
        JwtManager::new(jwt_config(&self.config))
            .map_err(|e| BinError::assembly(format!("Invalid token settings: {}", e)))
    }

    /// Wires every service over in-memory backends.
    pub fn assemble(&self) -> BinResult<Assembly> {
        let cache = cache_config(&self.config);
        let (dispatcher, email_jobs) = ChannelDispatcher::channel(self.config.dispatcher.capacity);

        let mut builder = AppState::builder()
            .config(auth_config(&self.config))
            .cache_config(cache.clone())
            .dispatcher(Arc::new(dispatcher));

        let registry = if cache.metrics_enabled {
            let registry = Registry::new();
            let metrics = CacheMetrics::register(&registry)
                .map_err(|e| BinError::assembly(format!("Failed to register cache metrics: {}", e)))?;
            builder = builder.metrics(metrics);
            Some(registry)
        } else {
            None
        };

        let state = builder.build()?;

        info!(
            service = %self.config.service.name,
            environment = %self.config.service.environment,
            policy = self.config.authorization.policy.as_str(),
            metrics = registry.is_some(),
            "Services assembled"
        );

        Ok(Assembly {
            state,
            email_jobs,
            registry,
        })
    }
}

/// Everything [`Runtime::assemble`] produced.
pub struct Assembly {
    /// Service graph.
    pub state: AppState,
    /// Jobs submitted by the services.
    pub email_jobs: mpsc::Receiver<JobEnvelope>,
    /// Metric registry, when cache metrics are enabled.
    pub registry: Option<Registry>,
}

// =============================================================================
// Email worker
// =============================================================================

/// Drains the email queue, at most `concurrency` jobs at a time.
///
/// Jobs are decoded and handed to the log sink; a job that fails to decode is
/// dropped with a warning. The task ends when every sender is gone and
/// yields the number of jobs delivered.
pub fn spawn_email_worker(
    mut jobs: mpsc::Receiver<JobEnvelope>,
    concurrency: usize,
) -> JoinHandle<usize> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    tokio::spawn(async move {
        let mut tasks = Vec::new();
        while let Some(envelope) = jobs.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                deliver(&envelope)
            }));
        }

        let mut delivered = 0;
        for task in tasks {
            if matches!(task.await, Ok(true)) {
                delivered += 1;
            }
        }
        debug!(delivered, "Email worker stopped");
        delivered
    })
}

fn deliver(envelope: &JobEnvelope) -> bool {
    match envelope.email_job() {
        Ok(job) => {
            info!(
                job_id = %envelope.id,
                job = job.job_name(),
                recipient = job.recipient(),
                attempts = envelope.retry.attempts,
                "Email job delivered to log sink"
            );
            true
        }
        Err(e) => {
            warn!(job_id = %envelope.id, error = %e, "Dropping undecodable email job");
            false
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_config::SecretValue;
    use keygate_core::{EmailJob, TaskDispatcher};

    fn config() -> KeygateConfig {
        let mut config = KeygateConfig::default();
        config.security.jwt.access_secret = SecretValue::new("access-secret-0123456789");
        config.security.jwt.refresh_secret = SecretValue::new("refresh-secret-0123456789");
        config
    }

    #[test]
    fn test_auth_config_conversion() {
        let mut source = config();
        source.authorization.policy = PermissionPolicy::LiveOnly;
        source.dispatcher.attempts = 3;
        source.security.otp.digits = 8;

        let converted = auth_config(&source);
        assert_eq!(converted.policy, SnapshotPolicy::LiveOnly);
        assert_eq!(converted.email_retry.attempts, 3);
        assert_eq!(converted.email_retry.backoff_base_ms, 3000);
        assert_eq!(converted.otp.digits, 8);
        assert_eq!(converted.session.ttl, Duration::from_secs(604_800));
        assert_eq!(converted.session.operation_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_cache_config_conversion() {
        let mut source = config();
        source.cache.operation_timeout_ms = 150;
        source.cache.list_ttl_secs = 30;

        let converted = cache_config(&source);
        assert_eq!(converted.operation_timeout, Duration::from_millis(150));
        assert_eq!(converted.list_ttl, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_assemble_with_metrics() {
        let mut source = config();
        source.cache.metrics_enabled = true;

        let assembly = Runtime::new(source).assemble().unwrap();
        assert!(assembly.registry.is_some());
        assert_eq!(assembly.state.authorizer.policy(), SnapshotPolicy::Union);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "service:\n  name: keygate-file\nsecurity:\n  jwt:\n    access_secret: \"file-access-secret-0123456789\"\n    refresh_secret: \"file-refresh-secret-0123456789\""
        )
        .unwrap();

        let runtime = Runtime::load(Some(file.path())).unwrap();
        assert_eq!(runtime.config().service.name, "keygate-file");
    }

    #[test]
    fn test_assemble_rejects_unusable_secrets() {
        let mut source = config();
        source.security.jwt.refresh_secret = source.security.jwt.access_secret.clone();
        assert!(Runtime::new(source).assemble().is_err());
    }

    #[tokio::test]
    async fn test_email_worker_drains_queue() {
        let (dispatcher, receiver) = ChannelDispatcher::channel(8);
        let worker = spawn_email_worker(receiver, 2);

        for email in ["a@example.com", "b@example.com"] {
            let job = EmailJob::RegisterOtp {
                email: email.to_string(),
                name: "Ann".to_string(),
                otp: "123456".to_string(),
            };
            dispatcher
                .submit(JobEnvelope::email(&job, RetryPolicy::default()).unwrap())
                .await
                .unwrap();
        }
        drop(dispatcher);

        assert_eq!(worker.await.unwrap(), 2);
    }
}
