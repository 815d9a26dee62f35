// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! The scheduler runs as a long-lived daemon, so the CLI stays small:
//! where the configuration lives, which operator tag this instance claims,
//! and how chatty the logs should be. Everything else is configuration-file
//! territory.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments of the Cortex scheduling engine.
#[derive(Debug, Clone, Parser)]
#[command(name = "cortex", about = "External scheduling and descheduling engine", version)]
pub struct Cli {
    /// Path to the configuration file (TOML or YAML).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Operator tag claimed by this instance; overrides the configured one.
    #[arg(long)]
    pub operator: Option<String>,

    /// Seed the resource plane from this YAML file at startup.
    #[arg(long)]
    pub resources: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parses the process arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
