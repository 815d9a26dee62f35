// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Capacity-Balancing Weighers
//!
//! Min-max scale a utilisation percentage into a configured activation
//! range per subject. The default range is inverted (emptier subjects get
//! the higher activation), which spreads load instead of packing it. Three
//! registrations share the machinery: compute hosts read the host
//! utilisation feature, block-storage and file-share pools read the pool
//! capacity feature under their respective kinds.

use crate::infrastructure::registry::{parse_options, StageContext};
use crate::infrastructure::store::FeatureStore;
use cortex_domain::entities::{BlockStorageRequest, ComputeRequest, FileShareRequest};
use cortex_domain::services::{MinMaxScale, RunTrace, SchedulerStage, StepResult};
use cortex_domain::{SchedulerError, Subject};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Options shared by the capacity-balancing weighers.
#[derive(Debug, Clone, Deserialize)]
pub struct CapacityBalanceOptions {
    #[serde(default = "default_scale")]
    pub scale: MinMaxScale,
}

fn default_scale() -> MinMaxScale {
    // Utilisation 0..100% maps onto 1..0: emptier is better.
    MinMaxScale {
        input: (0.0, 100.0),
        activation: (1.0, 0.0),
    }
}

impl Default for CapacityBalanceOptions {
    fn default() -> Self {
        Self {
            scale: default_scale(),
        }
    }
}

fn parse_validated(context: &StageContext) -> Result<(Arc<FeatureStore>, MinMaxScale), SchedulerError> {
    let options: CapacityBalanceOptions = parse_options(&context.options)?;
    options.scale.validate()?;
    Ok((context.store()?.clone(), options.scale))
}

/// Utilisation percentage per subject, echoing subjects without data at 0%.
fn scaled_result(
    weights: &HashMap<Subject, f64>,
    utilization_pct: &HashMap<String, f64>,
    scale: &MinMaxScale,
) -> StepResult {
    let mut result = StepResult::new();
    for subject in weights.keys() {
        match utilization_pct.get(subject.as_str()) {
            Some(pct) => {
                result.record_statistic("utilization_pct", subject.clone(), *pct);
                result.activate(subject.clone(), scale.scale(*pct));
            }
            None => {
                result.activate(subject.clone(), 0.0);
            }
        }
    }
    result
}

#[derive(sqlx::FromRow)]
struct HostUtilRow {
    host: String,
    used: f64,
    capacity: f64,
}

/// Balances compute hosts by their average utilisation percentage.
#[derive(Debug)]
pub struct HostCapacityBalance {
    store: Arc<FeatureStore>,
    scale: MinMaxScale,
}

impl HostCapacityBalance {
    pub const NAME: &'static str = "capacity_balance";

    pub fn new(context: &StageContext) -> Result<Self, SchedulerError> {
        let (store, scale) = parse_validated(context)?;
        Ok(Self { store, scale })
    }
}

#[async_trait]
impl SchedulerStage<ComputeRequest> for HostCapacityBalance {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        _request: &ComputeRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        let rows: Vec<HostUtilRow> = self
            .store
            .fetch_rows("SELECT host, used, capacity FROM feature_host_utilization WHERE capacity > 0")
            .await?;

        let mut sums: HashMap<String, (f64, u32)> = HashMap::new();
        for row in rows {
            let entry = sums.entry(row.host).or_insert((0.0, 0));
            entry.0 += row.used / row.capacity * 100.0;
            entry.1 += 1;
        }
        let pct: HashMap<String, f64> = sums
            .into_iter()
            .map(|(host, (sum, n))| (host, sum / n as f64))
            .collect();

        Ok(scaled_result(weights, &pct, &self.scale))
    }
}

#[derive(sqlx::FromRow)]
struct PoolUtilRow {
    pool: String,
    utilization_pct: f64,
}

/// Balances storage or share pools by their utilisation percentage.
///
/// The same implementation serves both pool-shaped kinds; the registry
/// instantiates it with the matching feature kind.
#[derive(Debug)]
pub struct PoolCapacityBalance {
    store: Arc<FeatureStore>,
    scale: MinMaxScale,
    feature_kind: &'static str,
    name: &'static str,
}

impl PoolCapacityBalance {
    pub const BLOCK_NAME: &'static str = "pool_capacity_balance";
    pub const SHARE_NAME: &'static str = "share_capacity_balance";

    pub fn for_block_storage(context: &StageContext) -> Result<Self, SchedulerError> {
        let (store, scale) = parse_validated(context)?;
        Ok(Self {
            store,
            scale,
            feature_kind: "block",
            name: Self::BLOCK_NAME,
        })
    }

    pub fn for_file_share(context: &StageContext) -> Result<Self, SchedulerError> {
        let (store, scale) = parse_validated(context)?;
        Ok(Self {
            store,
            scale,
            feature_kind: "share",
            name: Self::SHARE_NAME,
        })
    }

    async fn utilization(&self) -> Result<HashMap<String, f64>, SchedulerError> {
        let rows: Vec<PoolUtilRow> = self
            .store
            .fetch_rows(&format!(
                "SELECT pool, utilization_pct FROM feature_pool_capacity WHERE kind = '{}'",
                self.feature_kind
            ))
            .await?;
        Ok(rows.into_iter().map(|r| (r.pool, r.utilization_pct)).collect())
    }
}

#[async_trait]
impl SchedulerStage<BlockStorageRequest> for PoolCapacityBalance {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        _request: &BlockStorageRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        Ok(scaled_result(weights, &self.utilization().await?, &self.scale))
    }
}

#[async_trait]
impl SchedulerStage<FileShareRequest> for PoolCapacityBalance {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        _request: &FileShareRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        Ok(scaled_result(weights, &self.utilization().await?, &self.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::services::PipelineRequest;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_degenerate_scale_rejected_at_init() {
        let store = Arc::new(FeatureStore::in_memory().await.unwrap());
        let err = HostCapacityBalance::new(&StageContext::new(
            Some(store),
            serde_json::json!({"scale": {"input": [50.0, 50.0], "activation": [0.0, 1.0]}}),
        ))
        .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_emptier_pool_gets_higher_activation() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        for (pool, pct) in [("pool-a", 20.0), ("pool-b", 90.0)] {
            sqlx::query(
                "INSERT INTO feature_pool_capacity (pool, kind, capacity, free, utilization_pct) VALUES (?, 'block', 100, ?, ?)",
            )
            .bind(pool)
            .bind(100.0 - pct)
            .bind(pct)
            .execute(store.pool())
            .await
            .unwrap();
        }

        let stage = PoolCapacityBalance::for_block_storage(&StageContext::new(
            Some(Arc::new(store)),
            serde_json::Value::Null,
        ))
        .unwrap();
        let request = BlockStorageRequest {
            project_id: "p1".to_string(),
            volume_uuid: Uuid::new_v4(),
            size_gb: 10,
            pools: vec![Subject::new("pool-a"), Subject::new("pool-b")],
            weights: HashMap::new(),
        };
        let weights = request.baseline_weights();
        let result = stage.run(&RunTrace::new("t", vec![]), &request, &weights).await.unwrap();
        assert!(result.activations[&Subject::new("pool-a")] > result.activations[&Subject::new("pool-b")]);
        assert!((result.activations[&Subject::new("pool-a")] - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_average_over_resources_for_hosts() {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        for (resource, used) in [("cpu", 40.0), ("memory", 60.0)] {
            sqlx::query("INSERT INTO feature_host_utilization (host, resource, used, capacity) VALUES ('h1', ?, ?, 100)")
                .bind(resource)
                .bind(used)
                .execute(store.pool())
                .await
                .unwrap();
        }

        let stage =
            HostCapacityBalance::new(&StageContext::new(Some(Arc::new(store)), serde_json::Value::Null)).unwrap();
        let request = ComputeRequest {
            project_id: "p1".to_string(),
            instance_uuid: Uuid::new_v4(),
            num_instances: 1,
            flavor: cortex_domain::entities::Flavor {
                name: "m1.small".to_string(),
                vcpus: 1,
                memory_mb: 512,
                extra_specs: HashMap::new(),
                is_vmware: false,
                affinity: None,
                scheduler_hints: HashMap::new(),
            },
            hosts: vec![Subject::new("h1")],
            weights: HashMap::new(),
        };
        let weights = request.baseline_weights();
        let result = stage.run(&RunTrace::new("t", vec![]), &request, &weights).await.unwrap();
        // 50% average utilisation maps to 0.5 on the inverted default scale.
        assert!((result.activations[&Subject::new("h1")] - 0.5).abs() < 1e-9);
    }
}
