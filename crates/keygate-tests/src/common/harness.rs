// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! Assembles the full service graph over in-memory backends with the
//! counting store and recording dispatcher in place, and seeds the catalog.

use std::sync::Arc;
use std::time::Duration;

use keygate_auth::services::{LoginRequest, LoginResponse};
use keygate_auth::{ApiResult, AppState, AuthConfig, AuthContext, Requirement, SnapshotPolicy};
use keygate_cache::{CacheConfig, CacheStore, MemoryCache};
use keygate_core::{
    ApprovalStatus, AuthStore, MemoryStore, PermissionCode, PermissionSet, User, UserId,
};

use super::fixtures::{test_jwt_config, Catalog, PlainHasher, TEST_PASSWORD};
use super::init_test_logging;
use super::mocks::{CountingStore, RecordingDispatcher};

// =============================================================================
// Configuration
// =============================================================================

/// Knobs for [`TestHarness`].
#[derive(Clone)]
pub struct TestHarnessConfig {
    /// Authorization snapshot policy.
    pub policy: SnapshotPolicy,
    /// Cache backend. Defaults to a fresh [`MemoryCache`].
    pub cache: Option<Arc<dyn CacheStore>>,
    /// Session backend. Defaults to a fresh [`MemoryCache`].
    pub session_store: Option<Arc<dyn CacheStore>>,
    /// Cache TTLs and deadline.
    pub cache_config: CacheConfig,
    /// Session store deadline.
    pub session_timeout: Duration,
}

impl Default for TestHarnessConfig {
    fn default() -> Self {
        Self {
            policy: SnapshotPolicy::Union,
            cache: None,
            session_store: None,
            cache_config: CacheConfig::for_testing(),
            session_timeout: Duration::from_millis(50),
        }
    }
}

impl TestHarnessConfig {
    /// Default knobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot policy.
    pub fn policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the cache backend.
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the session backend.
    pub fn session_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.session_store = Some(store);
        self
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A seeded service graph.
pub struct TestHarness {
    /// Every service.
    pub state: AppState,
    /// Seeded roles and permissions.
    pub catalog: Catalog,
    /// The store behind the services, for direct setup.
    pub memory: Arc<MemoryStore>,
    /// The store as the services see it.
    pub store: Arc<CountingStore>,
    /// Cache backend.
    pub cache: Arc<dyn CacheStore>,
    /// Session backend.
    pub session_store: Arc<dyn CacheStore>,
    /// Email queue.
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl TestHarness {
    /// Harness with default knobs.
    pub async fn new() -> Self {
        Self::with_config(TestHarnessConfig::default()).await
    }

    /// Harness with `config`.
    pub async fn with_config(config: TestHarnessConfig) -> Self {
        init_test_logging();

        let memory = Arc::new(MemoryStore::new());
        let catalog = Catalog::seed(memory.as_ref()).await;
        let store = Arc::new(CountingStore::new(memory.clone()));

        let cache = config
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new()));
        let session_store = config
            .session_store
            .unwrap_or_else(|| Arc::new(MemoryCache::new()));
        let dispatcher = Arc::new(RecordingDispatcher::new());

        let auth_config = AuthConfig::new(test_jwt_config())
            .with_session_timeout(config.session_timeout)
            .with_policy(config.policy);

        let state = AppState::builder()
            .config(auth_config)
            .store(store.clone())
            .cache(cache.clone())
            .session_store(session_store.clone())
            .cache_config(config.cache_config)
            .dispatcher(dispatcher.clone())
            .hasher(Arc::new(PlainHasher))
            .build()
            .expect("harness state");

        Self {
            state,
            catalog,
            memory,
            store,
            cache,
            session_store,
            dispatcher,
        }
    }

    /// Inserts a verified, approved user holding `role` and `custom` overrides.
    pub async fn create_user(&self, email: &str, role: &str, custom: &[&str]) -> User {
        let mut user = User::new(
            "Test User",
            email,
            PlainHasher::encode(TEST_PASSWORD),
            self.catalog.role_id(role),
        );
        user.is_email_verified = true;
        user.approval_status = ApprovalStatus::Approved;
        user.permissions = custom.iter().map(|code| PermissionCode::new(*code)).collect();
        self.memory.create_user(user).await.expect("create user")
    }

    /// Id of the stored user with `email`.
    pub async fn user_id_for(&self, email: &str) -> UserId {
        self.memory
            .find_user_by_email(email)
            .await
            .expect("store lookup")
            .expect("user exists")
            .id
    }

    /// Logs in with the seeded password.
    pub async fn login(&self, email: &str) -> LoginResponse {
        self.try_login(email).await.expect("login")
    }

    /// Logs in with the seeded password, keeping the error.
    pub async fn try_login(&self, email: &str) -> ApiResult<LoginResponse> {
        self.state
            .auth
            .login(LoginRequest {
                email: email.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
    }

    /// The request context an access token produces.
    pub fn context_for(&self, access_token: &str) -> AuthContext {
        let claims = self
            .state
            .jwt
            .verify_access(access_token)
            .expect("valid access token");
        AuthContext::from_claims(&claims)
    }

    /// Checks `code` for the bearer of `access_token`.
    pub async fn authorize(&self, access_token: &str, code: &str) -> ApiResult<()> {
        let ctx = self.context_for(access_token);
        self.state
            .authorizer
            .authorize(&ctx, &Requirement::permission(code))
            .await
    }

    /// Effective permissions of `user_id` through the cache.
    pub async fn effective(&self, user_id: &UserId) -> PermissionSet {
        self.state
            .services
            .permissions
            .for_user_id(user_id)
            .await
            .expect("effective permissions")
            .effective_permissions
    }
}

/// Builds a set from string literals.
pub fn permission_set(codes: &[&str]) -> PermissionSet {
    codes.iter().map(|code| PermissionCode::new(*code)).collect()
}
