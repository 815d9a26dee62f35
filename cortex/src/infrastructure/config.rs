// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! Layered configuration for the engine: compiled defaults, then an
//! optional configuration file, then `CORTEX_`-prefixed environment
//! variables. A bad configuration is a startup failure; the process exits
//! non-zero rather than running half-configured.

use cortex_domain::SchedulerError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Feature store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite://cortex.db` or `sqlite::memory:`.
    pub url: String,
}

/// Reconciler cadence settings, all in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalsConfig {
    /// Datasource due-check cadence.
    pub sync_tick_secs: u64,
    /// Knowledge due-check cadence.
    pub knowledge_tick_secs: u64,
    /// Decision retry cadence for requests whose pipeline was not yet ready.
    pub decision_retry_secs: u64,
    /// Backoff after a retryable sync failure.
    pub sync_backoff_secs: u64,
}

impl IntervalsConfig {
    pub fn sync_tick(&self) -> Duration {
        Duration::from_secs(self.sync_tick_secs)
    }

    pub fn knowledge_tick(&self) -> Duration {
        Duration::from_secs(self.knowledge_tick_secs)
    }

    pub fn decision_retry(&self) -> Duration {
        Duration::from_secs(self.decision_retry_secs)
    }

    pub fn sync_backoff(&self) -> Duration {
        Duration::from_secs(self.sync_backoff_secs)
    }
}

/// Descheduler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeschedulerConfig {
    /// Skip the actuator call and leave records unissued. Default on:
    /// recommending migrations is safe, executing them is not.
    pub dry_run: bool,
    /// Cadence of descheduler pipeline runs, in seconds.
    pub interval_secs: u64,
}

impl DeschedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Bare-machine scheduling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Pipeline used for Decisions synthesised on behalf of unplaced
    /// machines.
    pub default_pipeline: String,
    /// Namespace the synthesised Decisions are created in.
    pub namespace: String,
}

/// Upstream wiring settings.
///
/// The concrete protocol clients are external collaborators; the one
/// upstream the binary can wire by itself is a static snapshot file, which
/// serves local runs and demos.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamConfig {
    /// YAML snapshot served as every upstream API.
    pub snapshot_file: Option<String>,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CortexConfig {
    /// Operator tag partitioning resources between engine instances.
    pub operator: String,
    pub database: DatabaseConfig,
    pub intervals: IntervalsConfig,
    pub descheduler: DeschedulerConfig,
    pub machines: MachineConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl CortexConfig {
    /// Loads configuration: defaults, then the optional file, then
    /// `CORTEX_`-prefixed environment variables (e.g.
    /// `CORTEX_DATABASE__URL`).
    pub fn load(file: Option<&Path>) -> Result<Self, SchedulerError> {
        let mut builder = config::Config::builder()
            .set_default("operator", "cortex")
            .map_err(config_err)?
            .set_default("database.url", "sqlite://cortex.db?mode=rwc")
            .map_err(config_err)?
            .set_default("intervals.sync_tick_secs", 15)
            .map_err(config_err)?
            .set_default("intervals.knowledge_tick_secs", 15)
            .map_err(config_err)?
            .set_default("intervals.decision_retry_secs", 10)
            .map_err(config_err)?
            .set_default("intervals.sync_backoff_secs", 60)
            .map_err(config_err)?
            .set_default("descheduler.dry_run", true)
            .map_err(config_err)?
            .set_default("descheduler.interval_secs", 300)
            .map_err(config_err)?
            .set_default("machines.default_pipeline", "machine-default")
            .map_err(config_err)?
            .set_default("machines.namespace", "default")
            .map_err(config_err)?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(config::Environment::with_prefix("CORTEX").separator("__"))
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)
    }
}

fn config_err(e: config::ConfigError) -> SchedulerError {
    SchedulerError::invalid_config(e.to_string())
}
