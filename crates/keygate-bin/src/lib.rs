// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # keygate-bin
//!
//! CLI binary for keygate.
//!
//! ```text
//!               main.rs
//!                  │
//!               cli.rs
//!                  │
//!      ┌───────────┼───────────┐
//!      ▼           ▼           ▼
//!  commands     runtime     logging
//!      │           │
//!      └─────┬─────┘
//!            ▼
//!        keygate-*
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Validate configuration
//! keygate -c keygate.yaml validate --show-config
//!
//! # Inspect an access token
//! keygate check-token "$TOKEN"
//!
//! # Show version
//! keygate version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{spawn_email_worker, Assembly, Runtime};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
