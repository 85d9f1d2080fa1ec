// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `keygate version`

use crate::cli::Cli;
use crate::error::BinResult;

/// Crate versions making up this binary.
pub fn components() -> [(&'static str, &'static str); 5] {
    [
        ("keygate-bin", crate::VERSION),
        ("keygate-core", keygate_core::VERSION),
        ("keygate-cache", keygate_cache::VERSION),
        ("keygate-auth", keygate_auth::VERSION),
        ("keygate-config", keygate_config::VERSION),
    ]
}

/// Prints component versions and the build target.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("keygate {}", crate::VERSION);
    println!();
    for (name, version) in components() {
        println!("  {:<15} {}", name, version);
    }
    println!();
    println!(
        "  target          {}-{}",
        std::env::consts::ARCH,
        std::env::consts::OS
    );
    println!();
    println!("PolyForm Noncommercial License 1.0.0");

    Ok(())
}
