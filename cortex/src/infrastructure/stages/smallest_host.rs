// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Smallest-Host Preference Weigher
//!
//! Prefers the smallest host that can take the workload, keeping large
//! hosts free for requests that actually need them. For each resource `r`
//! with weight `w_r` the stage looks at the capacities of the
//! still-eligible subjects only, and contributes
//! `1 − (cap − min)/(max − min)` per subject; the smallest host gets 1, the
//! largest 0. A resource whose min equals its max carries no signal and is
//! skipped; with all hosts identical the activation is 0 everywhere.

use crate::infrastructure::registry::{parse_options, StageContext};
use crate::infrastructure::store::FeatureStore;
use cortex_domain::entities::ComputeRequest;
use cortex_domain::services::{RunTrace, SchedulerStage, StepResult};
use cortex_domain::{SchedulerError, Subject};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Options of the smallest-host weigher.
#[derive(Debug, Clone, Deserialize)]
pub struct SmallestHostOptions {
    /// Resource name → weight; weights must be non-negative.
    #[serde(default = "default_resources")]
    pub resources: HashMap<String, f64>,
}

fn default_resources() -> HashMap<String, f64> {
    HashMap::from([("cpu".to_string(), 1.0), ("memory".to_string(), 1.0)])
}

impl Default for SmallestHostOptions {
    fn default() -> Self {
        Self {
            resources: default_resources(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CapacityRow {
    host: String,
    resource: String,
    capacity: f64,
}

/// Weigher preferring subjects with the smallest capacity.
#[derive(Debug)]
pub struct SmallestHost {
    store: Arc<FeatureStore>,
    options: SmallestHostOptions,
}

impl SmallestHost {
    pub const NAME: &'static str = "smallest_host";

    pub fn new(context: &StageContext) -> Result<Self, SchedulerError> {
        let options: SmallestHostOptions = parse_options(&context.options)?;
        for (resource, weight) in &options.resources {
            if *weight < 0.0 {
                return Err(SchedulerError::invalid_config(format!(
                    "smallest-host weight for resource {resource} must be non-negative, got {weight}"
                )));
            }
        }
        Ok(Self {
            store: context.store()?.clone(),
            options,
        })
    }
}

#[async_trait]
impl SchedulerStage<ComputeRequest> for SmallestHost {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        _request: &ComputeRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        let rows: Vec<CapacityRow> = self
            .store
            .fetch_rows("SELECT host, resource, capacity FROM feature_host_utilization")
            .await?;

        // capacity[resource][host], restricted to still-eligible subjects.
        let mut capacities: HashMap<&str, HashMap<&str, f64>> = HashMap::new();
        for row in &rows {
            if weights.contains_key(&Subject::new(row.host.as_str())) {
                capacities
                    .entry(row.resource.as_str())
                    .or_default()
                    .insert(row.host.as_str(), row.capacity);
            }
        }

        let mut result = StepResult::new();
        for subject in weights.keys() {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for (resource, weight) in &self.options.resources {
                let Some(per_host) = capacities.get(resource.as_str()) else {
                    continue;
                };
                let Some(cap) = per_host.get(subject.as_str()) else {
                    continue;
                };
                let min = per_host.values().cloned().fold(f64::INFINITY, f64::min);
                let max = per_host.values().cloned().fold(f64::NEG_INFINITY, f64::max);
                if min == max {
                    continue;
                }
                weighted_sum += weight * (1.0 - (cap - min) / (max - min));
                weight_total += weight;
            }
            let activation = if weight_total > 0.0 { weighted_sum / weight_total } else { 0.0 };
            result.activate(subject.clone(), activation);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::entities::Flavor;
    use uuid::Uuid;

    async fn store_with_capacities(rows: &[(&str, &str, f64)]) -> Arc<FeatureStore> {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        for (host, resource, capacity) in rows {
            sqlx::query("INSERT INTO feature_host_utilization (host, resource, used, capacity) VALUES (?, ?, 0, ?)")
                .bind(host)
                .bind(resource)
                .bind(capacity)
                .execute(store.pool())
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn request(hosts: &[&str]) -> ComputeRequest {
        ComputeRequest {
            project_id: "p1".to_string(),
            instance_uuid: Uuid::new_v4(),
            num_instances: 1,
            flavor: Flavor {
                name: "m1.small".to_string(),
                vcpus: 1,
                memory_mb: 512,
                extra_specs: HashMap::new(),
                is_vmware: false,
                affinity: None,
                scheduler_hints: HashMap::new(),
            },
            hosts: hosts.iter().map(|h| Subject::new(*h)).collect(),
            weights: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_smallest_host_wins() {
        let store = store_with_capacities(&[("small", "cpu", 32.0), ("big", "cpu", 128.0)]).await;
        let stage = SmallestHost::new(&StageContext::new(
            Some(store),
            serde_json::json!({"resources": {"cpu": 1.0}}),
        ))
        .unwrap();
        let req = request(&["small", "big"]);
        let weights = req.hosts.iter().map(|h| (h.clone(), 0.0)).collect();

        let result = stage.run(&RunTrace::new("t", vec![]), &req, &weights).await.unwrap();
        assert_eq!(result.activations[&Subject::new("small")], 1.0);
        assert_eq!(result.activations[&Subject::new("big")], 0.0);
    }

    #[tokio::test]
    async fn test_identical_capacities_skip_the_resource() {
        let store = store_with_capacities(&[("h1", "cpu", 64.0), ("h2", "cpu", 64.0)]).await;
        let stage = SmallestHost::new(&StageContext::new(
            Some(store),
            serde_json::json!({"resources": {"cpu": 1.0}}),
        ))
        .unwrap();
        let req = request(&["h1", "h2"]);
        let weights = req.hosts.iter().map(|h| (h.clone(), 0.0)).collect();

        let result = stage.run(&RunTrace::new("t", vec![]), &req, &weights).await.unwrap();
        assert_eq!(result.activations[&Subject::new("h1")], 0.0);
        assert_eq!(result.activations[&Subject::new("h2")], 0.0);
    }

    #[tokio::test]
    async fn test_ineligible_hosts_do_not_shift_the_range() {
        // "tiny" is not eligible any more, so the range is [64, 128].
        let store =
            store_with_capacities(&[("tiny", "cpu", 8.0), ("h1", "cpu", 64.0), ("h2", "cpu", 128.0)]).await;
        let stage = SmallestHost::new(&StageContext::new(
            Some(store),
            serde_json::json!({"resources": {"cpu": 1.0}}),
        ))
        .unwrap();
        let req = request(&["h1", "h2"]);
        let weights = req.hosts.iter().map(|h| (h.clone(), 0.0)).collect();

        let result = stage.run(&RunTrace::new("t", vec![]), &req, &weights).await.unwrap();
        assert_eq!(result.activations[&Subject::new("h1")], 1.0);
        assert_eq!(result.activations[&Subject::new("h2")], 0.0);
    }

    #[tokio::test]
    async fn test_negative_weight_rejected_at_init() {
        let store = store_with_capacities(&[]).await;
        let err = SmallestHost::new(&StageContext::new(
            Some(store),
            serde_json::json!({"resources": {"cpu": -1.0}}),
        ))
        .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }
}
