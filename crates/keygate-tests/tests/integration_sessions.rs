// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Session Integration Tests
//!
//! One active session per user, refresh against it, and what ends it.
//!
//! ## Test Categories
//!
//! - `test_session_*`: Session manager behavior
//! - `test_refresh_*`: Refresh against the active session
//! - `test_end_*`: Operations that end a session
//! - `test_outage_*`: Session store failures

use std::sync::Arc;

use axum::http::StatusCode;
use keygate_auth::session::token_digest;
use keygate_auth::services::{ChangePasswordRequest, ResetPasswordRequest};
use keygate_cache::CacheKeys;
use keygate_core::UserId;
use keygate_tests::prelude::*;

// =============================================================================
// Session manager
// =============================================================================

#[tokio::test]
async fn test_session_last_writer_wins() {
    let harness = TestHarness::new().await;
    let sessions = &harness.state.sessions;
    let user_id = UserId::new("u-single");

    sessions.create_session(&user_id, "token-a").await.unwrap();
    sessions.create_session(&user_id, "token-b").await.unwrap();

    assert!(!sessions.validate_session(&user_id, "token-a").await.unwrap());
    assert!(sessions.validate_session(&user_id, "token-b").await.unwrap());
}

#[tokio::test]
async fn test_session_stores_digest_only() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("dig"), STUDENT, &[])
        .await;
    let login = harness.login(&user.email).await;

    let session = harness
        .state
        .sessions
        .get_session(&user.id)
        .await
        .unwrap()
        .expect("session");
    assert_eq!(session.refresh_token_hash, token_digest(&login.refresh_token));

    let raw = harness
        .session_store
        .get(&CacheKeys::session(&user.id))
        .await
        .unwrap()
        .expect("stored session");
    assert!(!raw.to_string().contains(&login.refresh_token));
}

#[tokio::test]
async fn test_session_ttl_follows_refresh_lifetime() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("ttl"), STUDENT, &[])
        .await;
    harness.login(&user.email).await;

    let session = harness
        .state
        .sessions
        .get_session(&user.id)
        .await
        .unwrap()
        .expect("session");
    let lifetime_ms = session.expires_at - session.created_at;
    assert_eq!(lifetime_ms, test_jwt_config().refresh_ttl_secs * 1000);
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_after_second_login() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("two"), INSTRUCTOR, &[])
        .await;

    let first = harness.login(&user.email).await;
    let second = harness.login(&user.email).await;
    assert_ne!(first.refresh_token, second.refresh_token);

    let err = harness.state.auth.refresh(&first.refresh_token).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.user_message(), "Session invalid");

    let refreshed = harness.state.auth.refresh(&second.refresh_token).await.unwrap();
    let ctx = harness.context_for(&refreshed.access_token);
    assert_eq!(ctx.user_id, user.id);
}

#[tokio::test]
async fn test_refresh_recomputes_snapshot() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("snap"), INSTRUCTOR, &[])
        .await;
    let login = harness.login(&user.email).await;
    assert!(!harness.context_for(&login.access_token).has_permission("report:read"));

    harness
        .state
        .roles
        .grant_role_permission(&harness.catalog.role_id(INSTRUCTOR), "report:read")
        .await
        .unwrap();

    let refreshed = harness.state.auth.refresh(&login.refresh_token).await.unwrap();
    let ctx = harness.context_for(&refreshed.access_token);
    assert!(ctx.has_permission("report:read"));
    assert!(ctx.has_permission("course:write"));
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("mix"), STUDENT, &[])
        .await;
    let login = harness.login(&user.email).await;

    let err = harness.state.auth.refresh(&login.access_token).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_missing_token() {
    let harness = TestHarness::new().await;
    let err = harness.state.auth.refresh("  ").await.unwrap_err();
    assert_eq!(err.user_message(), "Refresh token missing");
}

#[tokio::test]
async fn test_refresh_for_deleted_user() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("gone"), STUDENT, &[])
        .await;
    let login = harness.login(&user.email).await;

    harness.state.users.delete_user(&user.id).await.unwrap();

    let err = harness.state.auth.refresh(&login.refresh_token).await.unwrap_err();
    assert_eq!(err.user_message(), "Session invalid");
}

// =============================================================================
// Ending sessions
// =============================================================================

#[tokio::test]
async fn test_end_logout() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("out"), STUDENT, &[])
        .await;
    let login = harness.login(&user.email).await;

    harness.state.auth.logout(&user.id).await.unwrap();
    harness.state.auth.logout(&user.id).await.unwrap();

    assert!(!harness.state.sessions.has_active_session(&user.id).await.unwrap());
    let err = harness.state.auth.refresh(&login.refresh_token).await.unwrap_err();
    assert_eq!(err.user_message(), "Session invalid");
}

#[tokio::test]
async fn test_end_ban() {
    let harness = TestHarness::new().await;
    let admin = harness.create_user(&unique_email("adm"), ADMIN, &[]).await;
    let user = harness
        .create_user(&unique_email("ban"), STUDENT, &[])
        .await;
    let login = harness.login(&user.email).await;

    harness.state.users.ban_user(&user.id, &admin.id).await.unwrap();

    assert!(!harness.state.sessions.has_active_session(&user.id).await.unwrap());
    assert!(harness.state.auth.refresh(&login.refresh_token).await.is_err());
    let err = harness.try_login(&user.email).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_end_delete_user_clears_session_store() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("gone"), STUDENT, &[])
        .await;
    let login = harness.login(&user.email).await;
    let key = CacheKeys::session(&user.id);
    assert!(harness.session_store.get(&key).await.unwrap().is_some());
    assert!(harness.cache.get(&key).await.unwrap().is_none());

    harness.state.users.delete_user(&user.id).await.unwrap();

    assert!(harness.session_store.get(&key).await.unwrap().is_none());
    let err = harness.state.auth.refresh(&login.refresh_token).await.unwrap_err();
    assert_eq!(err.user_message(), "Session invalid");
}

#[tokio::test]
async fn test_end_change_password() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("pw"), STUDENT, &[])
        .await;
    harness.login(&user.email).await;

    harness
        .state
        .auth
        .change_password(
            &user.id,
            ChangePasswordRequest {
                current_password: TEST_PASSWORD.to_string(),
                new_password: "another-secret".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(!harness.state.sessions.has_active_session(&user.id).await.unwrap());
}

#[tokio::test]
async fn test_end_reset_password() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("reset"), STUDENT, &[])
        .await;
    harness.login(&user.email).await;

    harness
        .state
        .auth
        .send_reset_password_otp(&user.email)
        .await
        .unwrap();
    let otp = harness.dispatcher.last_otp_for(&user.email).expect("reset code");

    harness
        .state
        .auth
        .verify_reset_password_otp(ResetPasswordRequest {
            email: user.email.clone(),
            otp,
            new_password: "brand-new-secret".to_string(),
        })
        .await
        .unwrap();

    assert!(!harness.state.sessions.has_active_session(&user.id).await.unwrap());
    assert!(harness.try_login(&user.email).await.is_err());
}

// =============================================================================
// Outages
// =============================================================================

#[tokio::test]
async fn test_outage_login_reports_unavailable() {
    let harness = TestHarness::with_config(
        TestHarnessConfig::new().session_store(Arc::new(FailingCache::new())),
    )
    .await;
    let user = harness
        .create_user(&unique_email("down"), STUDENT, &[])
        .await;

    let err = harness.try_login(&user.email).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_outage_validate_is_not_a_mismatch() {
    let harness = TestHarness::with_config(
        TestHarnessConfig::new().session_store(Arc::new(FailingCache::new())),
    )
    .await;

    let result = harness
        .state
        .sessions
        .validate_session(&UserId::new("u-1"), "token")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_outage_stalled_store_hits_deadline() {
    let harness = TestHarness::with_config(TestHarnessConfig::new().session_store(Arc::new(
        FailingCache::stalling(std::time::Duration::from_secs(5)),
    )))
    .await;

    let started = std::time::Instant::now();
    let result = harness
        .state
        .sessions
        .create_session(&UserId::new("u-1"), "token")
        .await;
    assert!(result.is_err());
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
}
