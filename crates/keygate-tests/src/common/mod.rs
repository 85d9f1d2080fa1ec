// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared fixtures, mocks and the harness used by every integration suite.
//!
//! ## Module Structure
//!
//! - `fixtures`: Seeded roles and permissions, secrets, config documents
//! - `mocks`: Store, cache and dispatcher doubles with call recording
//! - `harness`: The assembled service graph

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();
static EMAIL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Initialize test logging. Call this at the start of each test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,keygate=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Generate an email address no other test uses.
pub fn unique_email(prefix: &str) -> String {
    let seq = EMAIL_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}@example.com", prefix, std::process::id(), seq)
}
