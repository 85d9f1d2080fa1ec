// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;

use keygate_cache::{CacheConfig, CacheGuard, CacheMetrics, CacheStore, MemoryCache};
use keygate_core::{AuthStore, MemoryStore, NoopDispatcher, TaskDispatcher};

use crate::auth::{Authorizer, JwtManager, Requirement};
use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthLayer, RequireLayer};
use crate::otp::OtpIssuer;
use crate::password::{Argon2Hasher, PasswordHasher};
use crate::services::{
    AuthService, Credentials, Mailer, RoleAdminService, ServiceContext, UserAdminService,
};
use crate::session::SessionManager;

// =============================================================================
// AppState
// =============================================================================

/// Every service, wired once and shared across requests.
#[derive(Clone)]
pub struct AppState {
    /// Settings the state was built from.
    pub config: Arc<AuthConfig>,
    /// Shared store and cache collaborators.
    pub services: ServiceContext,
    /// Token signer.
    pub jwt: JwtManager,
    /// Single-device sessions.
    pub sessions: SessionManager,
    /// Authorization decisions.
    pub authorizer: Authorizer,
    /// Account lifecycle.
    pub auth: AuthService,
    /// User administration.
    pub users: UserAdminService,
    /// Role and permission administration.
    pub roles: RoleAdminService,
}

impl AppState {
    /// Creates a new app state builder.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Authentication layer for protected routes.
    pub fn auth_layer(&self) -> AuthLayer {
        AuthLayer::new(self.jwt.clone())
    }

    /// Guard layer for `requirement`.
    pub fn require(&self, requirement: Requirement) -> RequireLayer {
        RequireLayer::new(self.authorizer.clone(), requirement)
    }

    /// Guard layer for one permission.
    pub fn require_permission(&self, code: &str) -> RequireLayer {
        RequireLayer::permission(self.authorizer.clone(), code)
    }
}

// =============================================================================
// AppStateBuilder
// =============================================================================

/// Builder for constructing [`AppState`].
///
/// Only the configuration is required. Missing collaborators fall back to
/// the in-memory store and cache, a no-op dispatcher and Argon2 hashing.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<AuthConfig>,
    store: Option<Arc<dyn AuthStore>>,
    cache: Option<Arc<dyn CacheStore>>,
    session_store: Option<Arc<dyn CacheStore>>,
    cache_config: Option<CacheConfig>,
    metrics: Option<CacheMetrics>,
    dispatcher: Option<Arc<dyn TaskDispatcher>>,
    hasher: Option<Arc<dyn PasswordHasher>>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: AuthConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the durable store.
    pub fn store(mut self, store: Arc<dyn AuthStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the cache backend.
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets a separate session backend. Defaults to the cache backend.
    pub fn session_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Sets cache TTLs and the per-call deadline.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = Some(config);
        self
    }

    /// Records cache outcomes into `metrics`.
    pub fn metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the email dispatcher.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets the password hasher.
    pub fn hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Builds the AppState.
    pub fn build(self) -> ApiResult<AppState> {
        let config = self
            .config
            .ok_or_else(|| ApiError::internal("auth configuration is required"))?;
        let jwt = JwtManager::new(config.jwt.clone())?;

        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let cache = self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new()));
        let session_store = self.session_store.unwrap_or_else(|| cache.clone());
        let cache_config = self.cache_config.unwrap_or_default();

        let mut guard = CacheGuard::new(cache, &cache_config);
        if let Some(metrics) = self.metrics {
            guard = guard.with_metrics(metrics);
        }

        let services = ServiceContext::new(store, guard, cache_config);
        let sessions = SessionManager::new(session_store, config.session);
        let authorizer = Authorizer::new(services.role_source(), config.policy);
        let mailer = Mailer::new(
            self.dispatcher.unwrap_or_else(|| Arc::new(NoopDispatcher)),
            config.email_retry,
        );
        let credentials = Credentials {
            jwt: jwt.clone(),
            sessions: sessions.clone(),
            hasher: self.hasher.unwrap_or_else(|| Arc::new(Argon2Hasher::new())),
            otp: OtpIssuer::new(config.otp),
            password_policy: config.password,
        };

        tracing::info!(policy = %config.policy, "Auth services assembled");

        Ok(AppState {
            auth: AuthService::new(services.clone(), credentials, mailer),
            users: UserAdminService::new(services.clone(), sessions.clone()),
            roles: RoleAdminService::new(services.clone()),
            config: Arc::new(config),
            services,
            jwt,
            sessions,
            authorizer,
        })
    }
}

// =============================================================================
// FromRef implementations for extracting parts of state
// =============================================================================

impl axum::extract::FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl axum::extract::FromRef<AppState> for UserAdminService {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}

impl axum::extract::FromRef<AppState> for RoleAdminService {
    fn from_ref(state: &AppState) -> Self {
        state.roles.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
