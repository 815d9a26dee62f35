// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Soft Affinity / Anti-Affinity Weigher
//!
//! Counts how many members of the request's affinity group already reside
//! on each candidate host, using the workload-placement feature. The
//! activation is `+count` under soft affinity and `−count` under soft
//! anti-affinity. Requests without an affinity descriptor get every host
//! echoed at 0; the stage has no opinion then.

use crate::infrastructure::registry::StageContext;
use crate::infrastructure::store::FeatureStore;
use cortex_domain::entities::{AffinityPolicy, ComputeRequest};
use cortex_domain::services::{RunTrace, SchedulerStage, StepResult};
use cortex_domain::{SchedulerError, Subject};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(sqlx::FromRow)]
struct PlacementRow {
    workload: String,
    host: String,
}

/// Weigher attracting (or repelling) a request towards its group members.
#[derive(Debug)]
pub struct SoftAffinity {
    store: Arc<FeatureStore>,
}

impl SoftAffinity {
    pub const NAME: &'static str = "soft_affinity";

    pub fn new(context: &StageContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
        })
    }
}

#[async_trait]
impl SchedulerStage<ComputeRequest> for SoftAffinity {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        request: &ComputeRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        let Some(group) = &request.flavor.affinity else {
            return Ok(StepResult::echo(weights.keys().cloned()));
        };

        let members: HashSet<&str> = group.members.iter().map(String::as_str).collect();
        let rows: Vec<PlacementRow> = self
            .store
            .fetch_rows("SELECT workload, host FROM feature_workload_placement")
            .await?;

        let mut residents: HashMap<&str, f64> = HashMap::new();
        for row in &rows {
            if members.contains(row.workload.as_str()) {
                *residents.entry(row.host.as_str()).or_insert(0.0) += 1.0;
            }
        }

        let sign = match group.policy {
            AffinityPolicy::SoftAffinity => 1.0,
            AffinityPolicy::SoftAntiAffinity => -1.0,
        };

        let mut result = StepResult::new();
        for subject in weights.keys() {
            let count = residents.get(subject.as_str()).copied().unwrap_or(0.0);
            result.record_statistic("group_members", subject.clone(), count);
            result.activate(subject.clone(), sign * count);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::entities::{AffinityGroup, Flavor};
    use uuid::Uuid;

    async fn store_with_placements(rows: &[(&str, &str)]) -> Arc<FeatureStore> {
        let store = FeatureStore::in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        for (workload, host) in rows {
            sqlx::query("INSERT INTO feature_workload_placement (workload, host) VALUES (?, ?)")
                .bind(workload)
                .bind(host)
                .execute(store.pool())
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    fn request(hosts: &[&str], policy: Option<AffinityPolicy>) -> ComputeRequest {
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
                affinity: policy.map(|p| AffinityGroup {
                    members: vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
                    policy: p,
                }),
                scheduler_hints: HashMap::new(),
            },
            hosts: hosts.iter().map(|h| Subject::new(*h)).collect(),
            weights: HashMap::new(),
        }
    }

    async fn run(policy: Option<AffinityPolicy>) -> StepResult {
        let store = store_with_placements(&[("m1", "ha"), ("m2", "ha"), ("m1", "hb"), ("mx", "hc")]).await;
        let stage = SoftAffinity::new(&StageContext::new(Some(store), serde_json::Value::Null)).unwrap();
        let req = request(&["ha", "hb", "hc"], policy);
        let weights = req.hosts.iter().map(|h| (h.clone(), 0.0)).collect();
        stage.run(&RunTrace::new("t", vec![]), &req, &weights).await.unwrap()
    }

    #[tokio::test]
    async fn test_affinity_counts_group_members_per_host() {
        let result = run(Some(AffinityPolicy::SoftAffinity)).await;
        assert_eq!(result.activations[&Subject::new("ha")], 2.0);
        assert_eq!(result.activations[&Subject::new("hb")], 1.0);
        assert_eq!(result.activations[&Subject::new("hc")], 0.0);
    }

    #[tokio::test]
    async fn test_anti_affinity_negates_the_count() {
        let result = run(Some(AffinityPolicy::SoftAntiAffinity)).await;
        assert_eq!(result.activations[&Subject::new("ha")], -2.0);
        assert_eq!(result.activations[&Subject::new("hc")], 0.0);
    }

    #[tokio::test]
    async fn test_no_group_echoes_everything_at_zero() {
        let result = run(None).await;
        assert!(result.activations.values().all(|v| *v == 0.0));
        assert_eq!(result.activations.len(), 3);
    }
}
