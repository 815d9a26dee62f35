// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cortex Bootstrap
//!
//! Process-level plumbing shared by the Cortex binaries: command-line
//! parsing, logger initialization, OS signal handling, and graceful
//! shutdown coordination. Nothing in here knows about scheduling; the
//! application crate wires these pieces around its controller loops.

pub mod cli;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use cli::Cli;
pub use logger::init_logging;
pub use shutdown::{CancellationToken, ShutdownCoordinator};
pub use signals::spawn_signal_listener;
