// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # keygate Integration Tests
//!
//! Integration tests that run the full keygate stack over in-memory
//! backends: store, cache, session store and email queue.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Seeded catalog, secrets and config documents
//!   - `mocks`: Failing cache, counting store, recording dispatcher
//!   - `harness`: Fully wired service graph
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p keygate-tests
//!
//! # Run specific test suite
//! cargo test -p keygate-tests --test integration_permissions
//! cargo test -p keygate-tests --test integration_sessions
//! cargo test -p keygate-tests --test integration_authorization
//! cargo test -p keygate-tests --test integration_invalidation
//! cargo test -p keygate-tests --test integration_accounts
//! cargo test -p keygate-tests --test integration_config
//!
//! # Run with log output
//! RUST_LOG=keygate=debug cargo test -p keygate-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Permissions (`integration_permissions.rs`)
//! - Effective permissions as role grants plus overrides
//! - Cold, warm and freshly invalidated caches
//! - Fail-open reads over a broken cache
//!
//! ### Sessions (`integration_sessions.rs`)
//! - One active session per user
//! - Refresh after a second login
//! - Session store outages
//!
//! ### Authorization (`integration_authorization.rs`)
//! - Snapshot policies after a role revocation
//! - Admin bypass and role predicates
//! - Tower layers end to end
//!
//! ### Invalidation (`integration_invalidation.rs`)
//! - Fan-out after grants, revocations and role changes
//!
//! ### Accounts (`integration_accounts.rs`)
//! - Registration, verification, login and password flows
//! - Admin listing and account state
//!
//! ### Config (`integration_config.rs`)
//! - File loading, environment overrides and runtime assembly
//!
//! ## Using the Harness
//!
//! ```rust,ignore
//! use keygate_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_harness() {
//!     let harness = TestHarness::new().await;
//!     let user = harness.create_user("ann@example.com", INSTRUCTOR, &["report:read"]).await;
//!     let login = harness.login(&user.email).await;
//!     // ...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, unique_email};
}
