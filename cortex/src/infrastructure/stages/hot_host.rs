// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hot-Host Evictor
//!
//! Descheduler stage recommending migrations away from overloaded hosts:
//! any host whose CPU utilisation exceeds the configured threshold gets its
//! busiest workloads (by flavor vCPUs) nominated for migration, up to a
//! per-host cap. The recommendation is advisory; an external actuator
//! decides whether to act on it.

use crate::infrastructure::registry::{parse_options, StageContext};
use crate::infrastructure::store::FeatureStore;
use cortex_domain::services::{DeschedulerStage, MigrationRecommendation, RunTrace};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Options of the hot-host evictor.
#[derive(Debug, Clone, Deserialize)]
pub struct HotHostOptions {
    /// CPU utilisation percentage above which a host counts as hot.
    #[serde(default = "default_threshold")]
    pub cpu_threshold_pct: f64,
    /// Max workloads nominated per hot host per run.
    #[serde(default = "default_max_per_host")]
    pub max_per_host: usize,
}

fn default_threshold() -> f64 {
    90.0
}

fn default_max_per_host() -> usize {
    1
}

impl Default for HotHostOptions {
    fn default() -> Self {
        Self {
            cpu_threshold_pct: default_threshold(),
            max_per_host: default_max_per_host(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct HotHostRow {
    host: String,
    utilization_pct: f64,
}

#[derive(sqlx::FromRow)]
struct WorkloadRow {
    uuid: String,
    host: String,
}

/// Descheduler stage vacating the busiest workloads of hot hosts.
#[derive(Debug)]
pub struct HotHostEvictor {
    store: Arc<FeatureStore>,
    options: HotHostOptions,
}

impl HotHostEvictor {
    pub const NAME: &'static str = "hot_host_evictor";

    pub fn new(context: &StageContext) -> Result<Self, SchedulerError> {
        let options: HotHostOptions = parse_options(&context.options)?;
        if !(0.0..=100.0).contains(&options.cpu_threshold_pct) {
            return Err(SchedulerError::invalid_config(format!(
                "cpu threshold must be a percentage, got {}",
                options.cpu_threshold_pct
            )));
        }
        Ok(Self {
            store: context.store()?.clone(),
            options,
        })
    }
}

#[async_trait]
impl DeschedulerStage for HotHostEvictor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, trace: &RunTrace) -> Result<Vec<MigrationRecommendation>, SchedulerError> {
        let hot: Vec<HotHostRow> = self
            .store
            .fetch_rows(
                "SELECT host, used / capacity * 100.0 AS utilization_pct \
                 FROM feature_host_utilization WHERE resource = 'cpu' AND capacity > 0",
            )
            .await?;

        let mut recommendations = Vec::new();
        for row in hot.iter().filter(|r| r.utilization_pct > self.options.cpu_threshold_pct) {
            let workloads: Vec<WorkloadRow> =
                sqlx::query_as("SELECT uuid, host FROM servers WHERE host = ? ORDER BY vcpus DESC LIMIT ?")
                    .bind(&row.host)
                    .bind(self.options.max_per_host as i64)
                    .fetch_all(self.store.pool())
                    .await
                    .map_err(|e| SchedulerError::store_error(e.to_string()))?;
            for workload in workloads {
                tracing::debug!(
                    pipeline = %trace.pipeline,
                    host = %workload.host,
                    workload = %workload.uuid,
                    utilization = row.utilization_pct,
                    "recommending migration off hot host"
                );
                recommendations.push(MigrationRecommendation {
                    workload: workload.uuid,
                    host: workload.host,
                    reason: format!(
                        "host cpu utilisation {:.1}% above threshold {:.1}%",
                        row.utilization_pct, self.options.cpu_threshold_pct
                    ),
                });
            }
        }
        Ok(recommendations)
    }
}
