// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Doubles for the three external collaborators:
//!
//! - [`FailingCache`]: a cache backend that never works
//! - [`CountingStore`]: a store wrapper that counts calls per method
//! - [`RecordingDispatcher`]: an email queue that keeps what it was given

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use keygate_cache::{CacheError, CacheResult, CacheStore};
use keygate_core::{
    AuthStore, CoreError, CoreResult, EmailJob, JobEnvelope, Permission, PermissionCode,
    PermissionId, Role, RoleId, RolePermission, RoleWithPermissions, TaskDispatcher, User, UserId,
    UserPage, UserQuery,
};

// =============================================================================
// Failing Cache
// =============================================================================

/// A cache backend whose every call fails.
///
/// With a delay the call first stalls, which lets callers exercise their
/// deadline instead of the error path.
#[derive(Debug, Default)]
pub struct FailingCache {
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl FailingCache {
    /// Fails immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stalls for `delay` before failing.
    pub fn stalling(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of calls received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Err(CacheError::unavailable("connection refused"))
    }
}

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<serde_json::Value>> {
        self.fail().await
    }

    async fn set(&self, _key: &str, _value: serde_json::Value, _ttl: Duration) -> CacheResult<()> {
        self.fail().await
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        self.fail().await
    }

    async fn delete_by_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        self.fail().await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

// =============================================================================
// Counting Store
// =============================================================================

/// Forwards to an inner store and counts calls per method name.
pub struct CountingStore {
    inner: Arc<dyn AuthStore>,
    calls: Mutex<HashMap<&'static str, u64>>,
}

impl std::fmt::Debug for CountingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingStore")
            .field("calls", &*self.calls.lock())
            .finish_non_exhaustive()
    }
}

impl CountingStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn AuthStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Calls made to `method`.
    pub fn count(&self, method: &str) -> u64 {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    /// Calls made across every method.
    pub fn total(&self) -> u64 {
        self.calls.lock().values().sum()
    }

    /// Forgets every recorded call.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().entry(method).or_insert(0) += 1;
    }
}

#[async_trait]
impl AuthStore for CountingStore {
    async fn find_role(&self, id: &RoleId) -> CoreResult<Option<Role>> {
        self.record("find_role");
        self.inner.find_role(id).await
    }

    async fn find_role_by_name(&self, name: &str) -> CoreResult<Option<Role>> {
        self.record("find_role_by_name");
        self.inner.find_role_by_name(name).await
    }

    async fn find_roles(&self, ids: &[RoleId]) -> CoreResult<Vec<Role>> {
        self.record("find_roles");
        self.inner.find_roles(ids).await
    }

    async fn list_roles(&self) -> CoreResult<Vec<Role>> {
        self.record("list_roles");
        self.inner.list_roles().await
    }

    async fn create_role(&self, role: Role) -> CoreResult<Role> {
        self.record("create_role");
        self.inner.create_role(role).await
    }

    async fn update_role(&self, role: Role) -> CoreResult<Role> {
        self.record("update_role");
        self.inner.update_role(role).await
    }

    async fn find_permission_by_code(
        &self,
        code: &PermissionCode,
    ) -> CoreResult<Option<Permission>> {
        self.record("find_permission_by_code");
        self.inner.find_permission_by_code(code).await
    }

    async fn find_permissions(&self, ids: &[PermissionId]) -> CoreResult<Vec<Permission>> {
        self.record("find_permissions");
        self.inner.find_permissions(ids).await
    }

    async fn find_permissions_by_codes(
        &self,
        codes: &[PermissionCode],
    ) -> CoreResult<Vec<Permission>> {
        self.record("find_permissions_by_codes");
        self.inner.find_permissions_by_codes(codes).await
    }

    async fn list_permissions(&self) -> CoreResult<Vec<Permission>> {
        self.record("list_permissions");
        self.inner.list_permissions().await
    }

    async fn create_permission(&self, permission: Permission) -> CoreResult<Permission> {
        self.record("create_permission");
        self.inner.create_permission(permission).await
    }

    async fn find_role_permissions(&self, role_ids: &[RoleId]) -> CoreResult<Vec<RolePermission>> {
        self.record("find_role_permissions");
        self.inner.find_role_permissions(role_ids).await
    }

    async fn create_role_permission(&self, mapping: RolePermission) -> CoreResult<RolePermission> {
        self.record("create_role_permission");
        self.inner.create_role_permission(mapping).await
    }

    async fn delete_role_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> CoreResult<bool> {
        self.record("delete_role_permission");
        self.inner.delete_role_permission(role_id, permission_id).await
    }

    async fn roles_with_permissions(&self) -> CoreResult<Vec<RoleWithPermissions>> {
        self.record("roles_with_permissions");
        self.inner.roles_with_permissions().await
    }

    async fn find_user(&self, id: &UserId) -> CoreResult<Option<User>> {
        self.record("find_user");
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        self.record("find_user_by_email");
        self.inner.find_user_by_email(email).await
    }

    async fn find_users(&self, query: &UserQuery) -> CoreResult<UserPage> {
        self.record("find_users");
        self.inner.find_users(query).await
    }

    async fn create_user(&self, user: User) -> CoreResult<User> {
        self.record("create_user");
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: User) -> CoreResult<User> {
        self.record("update_user");
        self.inner.update_user(user).await
    }

    async fn delete_user(&self, id: &UserId) -> CoreResult<bool> {
        self.record("delete_user");
        self.inner.delete_user(id).await
    }
}

// =============================================================================
// Recording Dispatcher
// =============================================================================

/// Keeps every submitted job; optionally rejects them all.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<JobEnvelope>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    /// Accepts every job.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every job.
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            failing: AtomicBool::new(true),
        }
    }

    /// Switches failure mode on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Accepted envelopes in submission order.
    pub fn envelopes(&self) -> Vec<JobEnvelope> {
        self.jobs.lock().clone()
    }

    /// Accepted jobs, decoded.
    pub fn jobs(&self) -> Vec<EmailJob> {
        self.jobs
            .lock()
            .iter()
            .filter_map(|envelope| envelope.email_job().ok())
            .collect()
    }

    /// The most recent code mailed to `email`.
    pub fn last_otp_for(&self, email: &str) -> Option<String> {
        self.jobs().into_iter().rev().find_map(|job| match job {
            EmailJob::RegisterOtp { email: to, otp, .. }
            | EmailJob::ResetPassOtp { email: to, otp, .. }
                if to == email =>
            {
                Some(otp)
            }
            _ => None,
        })
    }
}

#[async_trait]
impl TaskDispatcher for RecordingDispatcher {
    async fn submit(&self, job: JobEnvelope) -> CoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::dispatch("queue unavailable"));
        }
        self.jobs.lock().push(job);
        Ok(())
    }
}
