// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Effective Permission Integration Tests
//!
//! Effective permissions are the role's grants plus the user's overrides,
//! whatever state the cache is in.
//!
//! ## Test Categories
//!
//! - `test_union_*`: Role grants combined with overrides
//! - `test_cache_*`: Cache-aside reads and invalidation
//! - `test_fail_open_*`: Reads over a broken cache
//! - `test_batch_*`: Page enrichment

use std::sync::Arc;
use std::time::{Duration, Instant};

use keygate_cache::CacheKeys;
use keygate_core::{UserQuery, ADMIN_ROLE};
use keygate_tests::prelude::*;

// =============================================================================
// Union
// =============================================================================

#[tokio::test]
async fn test_union_instructor_with_override() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("ann"), INSTRUCTOR, &["report:read"])
        .await;

    let enriched = harness
        .state
        .services
        .permissions
        .for_user_id(&user.id)
        .await
        .unwrap();

    assert_eq!(enriched.role_name, INSTRUCTOR);
    assert_eq!(enriched.role_permissions, permission_set(INSTRUCTOR_GRANTS));
    assert_eq!(enriched.custom_permissions, permission_set(&["report:read"]));
    assert_eq!(
        enriched.effective_permissions,
        permission_set(&["course:read", "course:write", "report:read"])
    );
}

#[tokio::test]
async fn test_union_override_overlapping_role_grant() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("bo"), STUDENT, &["course:read"])
        .await;

    assert_eq!(harness.effective(&user.id).await, permission_set(&["course:read"]));
}

#[tokio::test]
async fn test_union_cold_warm_and_invalidated() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("cy"), INSTRUCTOR, &["report:read"])
        .await;
    let expected = permission_set(&["course:read", "course:write", "report:read"]);

    // cold
    assert_eq!(harness.effective(&user.id).await, expected);
    assert!(harness
        .cache
        .get(&CacheKeys::user_permissions(&user.id))
        .await
        .unwrap()
        .is_some());

    // warm
    assert_eq!(harness.effective(&user.id).await, expected);

    // invalidated
    harness.state.services.invalidation.invalidate_user(&user.id).await;
    harness
        .state
        .services
        .invalidation
        .invalidate_role_permissions(&harness.catalog.role_id(INSTRUCTOR))
        .await;
    assert_eq!(harness.effective(&user.id).await, expected);
}

#[tokio::test]
async fn test_union_admin_role_has_no_implicit_codes() {
    let harness = TestHarness::new().await;
    let user = harness.create_user(&unique_email("root"), ADMIN_ROLE, &[]).await;

    let enriched = harness
        .state
        .services
        .permissions
        .for_user_id(&user.id)
        .await
        .unwrap();
    assert_eq!(enriched.role_name, ADMIN);
    assert!(enriched.effective_permissions.is_empty());
}

// =============================================================================
// Cache-aside
// =============================================================================

#[tokio::test]
async fn test_cache_warm_read_skips_store() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("dee"), INSTRUCTOR, &[])
        .await;

    harness.effective(&user.id).await;
    assert_eq!(harness.store.count("find_user"), 1);

    harness.store.reset();
    harness.effective(&user.id).await;
    assert_eq!(harness.store.total(), 0);
}

#[tokio::test]
async fn test_cache_read_after_invalidation_hits_store() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("eve"), INSTRUCTOR, &[])
        .await;

    harness.effective(&user.id).await;
    harness.state.services.invalidation.invalidate_user(&user.id).await;

    harness.store.reset();
    harness.effective(&user.id).await;
    assert_eq!(harness.store.count("find_user"), 1);
}

#[tokio::test]
async fn test_cache_role_change_in_store_is_seen_after_invalidation() {
    let harness = TestHarness::new().await;
    let user = harness
        .create_user(&unique_email("fay"), INSTRUCTOR, &[])
        .await;
    assert!(harness.effective(&user.id).await.contains("course:write"));

    harness
        .state
        .roles
        .revoke_role_permission(&harness.catalog.role_id(INSTRUCTOR), "course:write")
        .await
        .unwrap();

    assert_eq!(harness.effective(&user.id).await, permission_set(&["course:read"]));
}

// =============================================================================
// Fail-open
// =============================================================================

#[tokio::test]
async fn test_fail_open_reads_fall_through_to_store() {
    let broken = Arc::new(FailingCache::new());
    let harness =
        TestHarness::with_config(TestHarnessConfig::new().cache(broken.clone())).await;
    let user = harness
        .create_user(&unique_email("gus"), INSTRUCTOR, &["report:read"])
        .await;

    let expected = permission_set(&["course:read", "course:write", "report:read"]);
    assert_eq!(harness.effective(&user.id).await, expected);
    assert_eq!(harness.effective(&user.id).await, expected);
    assert!(broken.calls() > 0);
    assert_eq!(harness.store.count("find_user"), 2);
}

#[tokio::test]
async fn test_fail_open_writes_and_invalidation_succeed() {
    let harness =
        TestHarness::with_config(TestHarnessConfig::new().cache(Arc::new(FailingCache::new())))
            .await;
    let user = harness
        .create_user(&unique_email("hal"), STUDENT, &[])
        .await;

    harness
        .state
        .roles
        .grant_role_permission(&harness.catalog.role_id(STUDENT), "report:read")
        .await
        .unwrap();
    harness
        .state
        .users
        .assign_permissions(&user.id, &["course:publish".to_string()])
        .await
        .unwrap();

    let login = harness.login(&user.email).await;
    assert_eq!(
        login.user.effective_permissions,
        permission_set(&["course:read", "report:read", "course:publish"])
    );
}

#[tokio::test]
async fn test_fail_open_stalled_cache_is_bounded_by_deadline() {
    let harness = TestHarness::with_config(
        TestHarnessConfig::new().cache(Arc::new(FailingCache::stalling(Duration::from_secs(5)))),
    )
    .await;
    let user = harness
        .create_user(&unique_email("ivy"), INSTRUCTOR, &[])
        .await;

    let started = Instant::now();
    assert_eq!(harness.effective(&user.id).await, permission_set(INSTRUCTOR_GRANTS));
    assert!(started.elapsed() < Duration::from_secs(2));
}

// =============================================================================
// Batch enrichment
// =============================================================================

#[tokio::test]
async fn test_batch_resolves_each_role_once() {
    let harness = TestHarness::new().await;
    for i in 0..4 {
        harness
            .create_user(&unique_email(&format!("inst{}", i)), INSTRUCTOR, &[])
            .await;
    }
    for i in 0..2 {
        harness
            .create_user(&unique_email(&format!("stud{}", i)), STUDENT, &["report:read"])
            .await;
    }

    harness.store.reset();
    let page = harness
        .state
        .users
        .list_users(UserQuery::page(1, 50))
        .await
        .unwrap();

    assert_eq!(page.total, 6);
    assert_eq!(harness.store.count("find_roles"), 1);
    assert_eq!(harness.store.count("find_role"), 0);
    for enriched in &page.users {
        let expected = if enriched.role_name == INSTRUCTOR {
            permission_set(INSTRUCTOR_GRANTS)
        } else {
            permission_set(&["course:read", "report:read"])
        };
        assert_eq!(enriched.effective_permissions, expected);
    }
}
