// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource-Utilisation Binpack Weigher
//!
//! Prefers the fullest host that still fits: for each configured resource
//! `r` with weight `w_r` the stage computes
//! `(used_r + requested_r) / capacity_r` and averages across resources,
//! weighted by `w_r`. Higher utilisation after placement means a higher
//! activation, so the ranking packs instances onto busy hosts and keeps
//! empty hosts free for large requests.
//!
//! Zero capacity or a missing feature row skips that resource for that
//! host. Hosts with no usable data at all are echoed at activation 0; no
//! data never filters a host here.

use crate::infrastructure::registry::{parse_options, StageContext};
use crate::infrastructure::store::FeatureStore;
use cortex_domain::entities::ComputeRequest;
use cortex_domain::services::{RunTrace, SchedulerStage, StepResult};
use cortex_domain::{SchedulerError, Subject};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Options of the binpack weigher.
#[derive(Debug, Clone, Deserialize)]
pub struct BinpackOptions {
    /// Resource name → weight. Weights must be strictly positive: a zero
    /// weight must be removed from the map, not parked at 0.
    #[serde(default = "default_resources")]
    pub resources: HashMap<String, f64>,
}

fn default_resources() -> HashMap<String, f64> {
    HashMap::from([("cpu".to_string(), 1.0), ("memory".to_string(), 1.0)])
}

impl Default for BinpackOptions {
    fn default() -> Self {
        Self {
            resources: default_resources(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct UtilizationRow {
    host: String,
    resource: String,
    used: f64,
    capacity: f64,
}

/// Weigher packing instances onto already-utilised hosts.
#[derive(Debug)]
pub struct UtilizationBinpack {
    store: Arc<FeatureStore>,
    options: BinpackOptions,
}

impl UtilizationBinpack {
    pub const NAME: &'static str = "utilization_binpack";

    pub fn new(context: &StageContext) -> Result<Self, SchedulerError> {
        let options: BinpackOptions = parse_options(&context.options)?;
        for (resource, weight) in &options.resources {
            if *weight <= 0.0 {
                return Err(SchedulerError::invalid_config(format!(
                    "binpack weight for resource {resource} must be positive, got {weight}"
                )));
            }
        }
        Ok(Self {
            store: context.store()?.clone(),
            options,
        })
    }

    /// Total requested amount of one resource, over all instances.
    fn requested(&self, request: &ComputeRequest, resource: &str) -> f64 {
        let per_instance = match resource {
            "cpu" => request.flavor.vcpus as f64,
            "memory" => request.flavor.memory_mb as f64,
            _ => 0.0,
        };
        per_instance * request.num_instances as f64
    }
}

#[async_trait]
impl SchedulerStage<ComputeRequest> for UtilizationBinpack {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        request: &ComputeRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        let rows: Vec<UtilizationRow> = self
            .store
            .fetch_rows("SELECT host, resource, used, capacity FROM feature_host_utilization")
            .await?;

        let mut by_host: HashMap<&str, Vec<&UtilizationRow>> = HashMap::new();
        for row in &rows {
            by_host.entry(row.host.as_str()).or_default().push(row);
        }

        let mut result = StepResult::new();
        for subject in weights.keys() {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            if let Some(host_rows) = by_host.get(subject.as_str()) {
                for (resource, weight) in &self.options.resources {
                    let Some(row) = host_rows.iter().find(|r| &r.resource == resource) else {
                        continue;
                    };
                    if row.capacity <= 0.0 {
                        continue;
                    }
                    let after_placement = (row.used + self.requested(request, resource)) / row.capacity;
                    weighted_sum += weight * after_placement;
                    weight_total += weight;
                }
            }
            let activation = if weight_total > 0.0 { weighted_sum / weight_total } else { 0.0 };
            result.record_statistic("utilization_after_placement", subject.clone(), activation);
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

    async fn store_with_cpu(rows: &[(&str, f64, f64)]) -> Arc<FeatureStore> {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        for (host, used, capacity) in rows {
            sqlx::query("INSERT INTO feature_host_utilization (host, resource, used, capacity) VALUES (?, 'cpu', ?, ?)")
                .bind(host)
                .bind(used)
                .bind(capacity)
                .execute(store.pool())
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn request(hosts: &[&str], vcpus: u64) -> ComputeRequest {
        ComputeRequest {
            project_id: "p1".to_string(),
            instance_uuid: Uuid::new_v4(),
            num_instances: 1,
            flavor: Flavor {
                name: "m1.small".to_string(),
                vcpus,
                memory_mb: 1024,
                extra_specs: HashMap::new(),
                is_vmware: false,
                affinity: None,
                scheduler_hints: HashMap::new(),
            },
            hosts: hosts.iter().map(|h| Subject::new(*h)).collect(),
            weights: HashMap::new(),
        }
    }

    fn stage(store: Arc<FeatureStore>, options: serde_json::Value) -> UtilizationBinpack {
        UtilizationBinpack::new(&StageContext::new(Some(store), options)).unwrap()
    }

    #[tokio::test]
    async fn test_prefers_the_fuller_host() {
        let store = store_with_cpu(&[("h1", 20.0, 100.0), ("h2", 80.0, 100.0)]).await;
        let stage = stage(store, serde_json::json!({"resources": {"cpu": 1.0}}));
        let req = request(&["h1", "h2"], 4);
        let weights = req.hosts.iter().map(|h| (h.clone(), 0.0)).collect();

        let result = stage.run(&RunTrace::new("t", vec![]), &req, &weights).await.unwrap();
        assert!((result.activations[&Subject::new("h1")] - 0.24).abs() < 1e-9);
        assert!((result.activations[&Subject::new("h2")] - 0.84).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_host_without_data_is_echoed_at_zero() {
        let store = store_with_cpu(&[("h1", 20.0, 100.0)]).await;
        let stage = stage(store, serde_json::json!({"resources": {"cpu": 1.0}}));
        let req = request(&["h1", "h2"], 4);
        let weights = req.hosts.iter().map(|h| (h.clone(), 0.0)).collect();

        let result = stage.run(&RunTrace::new("t", vec![]), &req, &weights).await.unwrap();
        assert_eq!(result.activations[&Subject::new("h2")], 0.0);
        assert_eq!(result.activations.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_skips_the_resource() {
        let store = store_with_cpu(&[("h1", 5.0, 0.0)]).await;
        let stage = stage(store, serde_json::json!({"resources": {"cpu": 1.0}}));
        let req = request(&["h1"], 4);
        let weights = req.hosts.iter().map(|h| (h.clone(), 0.0)).collect();

        let result = stage.run(&RunTrace::new("t", vec![]), &req, &weights).await.unwrap();
        assert_eq!(result.activations[&Subject::new("h1")], 0.0);
    }

    #[tokio::test]
    async fn test_non_positive_weight_rejected_at_init() {
        let store = store_with_cpu(&[]).await;
        let err = UtilizationBinpack::new(&StageContext::new(
            Some(store),
            serde_json::json!({"resources": {"cpu": 0.0}}),
        ))
        .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }
}
