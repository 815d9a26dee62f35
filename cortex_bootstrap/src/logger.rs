// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logger Initialization
//!
//! Installs the global `tracing` subscriber for the process. The verbosity
//! flag maps onto a default level; `RUST_LOG` still wins when set, so an
//! operator can turn a single controller's target up without redeploying.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// `verbosity` comes from the repeated `-v` CLI flag: 0 = info,
/// 1 = debug, 2+ = trace. Returns an error when a subscriber is already
/// installed (tests install their own).
pub fn init_logging(verbosity: u8) -> Result<(), String> {
    let default_level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cortex={default_level},warn")));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| format!("failed to install subscriber: {e}"))
}
