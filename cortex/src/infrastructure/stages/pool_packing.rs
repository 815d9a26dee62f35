// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Machine-Pool Packing Weigher
//!
//! Binpack semantics over machine pools: a pool's activation is its
//! allocation ratio after taking the machine, `(allocated + 1) / capacity`.
//! Pools whose size class does not match the request, or with no remaining
//! headroom, are filtered out entirely; this stage is the one filter in
//! the bare-machine catalogue.

use crate::infrastructure::registry::StageContext;
use crate::infrastructure::store::FeatureStore;
use cortex_domain::entities::BareMachineRequest;
use cortex_domain::services::{RunTrace, SchedulerStage, StepResult};
use cortex_domain::{SchedulerError, Subject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(sqlx::FromRow)]
struct PoolRow {
    name: String,
    size: String,
    capacity: i64,
    allocated: i64,
}

/// Filter-weigher packing machines into matching pools.
#[derive(Debug)]
pub struct PoolPacking {
    store: Arc<FeatureStore>,
}

impl PoolPacking {
    pub const NAME: &'static str = "pool_packing";

    pub fn new(context: &StageContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
        })
    }
}

#[async_trait]
impl SchedulerStage<BareMachineRequest> for PoolPacking {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        request: &BareMachineRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        let rows: Vec<PoolRow> = self
            .store
            .fetch_rows("SELECT name, size, capacity, allocated FROM machine_pools")
            .await?;
        let by_name: HashMap<&str, &PoolRow> = rows.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut result = StepResult::new();
        for subject in weights.keys() {
            let Some(pool) = by_name.get(subject.as_str()) else {
                // Unknown pool: no data, keep it at baseline.
                result.activate(subject.clone(), 0.0);
                continue;
            };
            if pool.size != request.size || pool.capacity <= 0 || pool.allocated >= pool.capacity {
                continue;
            }
            let after_placement = (pool.allocated + 1) as f64 / pool.capacity as f64;
            result.record_statistic("allocation_after_placement", subject.clone(), after_placement);
            result.activate(subject.clone(), after_placement);
        }
        Ok(result)
    }
}
