// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Reservation-Aware Evacuation Weigher
//!
//! For evacuation requests, hosts holding a ready failover reservation that
//! covers the workload get the configured high activation; every other host
//! gets the low one. Anything that is not an evacuation leaves activations
//! at baseline; the reservation signal only means something when a host
//! has actually failed.

use crate::infrastructure::registry::{parse_options, StageContext};
use crate::infrastructure::store::FeatureStore;
use cortex_domain::entities::{ComputeRequest, RequestIntent};
use cortex_domain::services::{RunTrace, SchedulerStage, StepResult};
use cortex_domain::{SchedulerError, Subject};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Options of the evacuation weigher.
#[derive(Debug, Clone, Deserialize)]
pub struct EvacuationOptions {
    /// Activation for hosts holding a ready covering reservation.
    #[serde(default = "default_high")]
    pub high: f64,
    /// Activation for every other host during an evacuation.
    #[serde(default = "default_low")]
    pub low: f64,
}

fn default_high() -> f64 {
    1.0
}

fn default_low() -> f64 {
    0.1
}

impl Default for EvacuationOptions {
    fn default() -> Self {
        Self {
            high: default_high(),
            low: default_low(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CoverRow {
    workload: String,
    host: String,
    ready: i64,
}

/// Weigher steering evacuations towards their failover reservations.
#[derive(Debug)]
pub struct EvacuationReservation {
    store: Arc<FeatureStore>,
    options: EvacuationOptions,
}

impl EvacuationReservation {
    pub const NAME: &'static str = "evacuation_reservation";

    pub fn new(context: &StageContext) -> Result<Self, SchedulerError> {
        Ok(Self {
            store: context.store()?.clone(),
            options: parse_options(&context.options)?,
        })
    }
}

#[async_trait]
impl SchedulerStage<ComputeRequest> for EvacuationReservation {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        _trace: &RunTrace,
        request: &ComputeRequest,
        weights: &HashMap<Subject, f64>,
    ) -> Result<StepResult, SchedulerError> {
        if request.intent() != RequestIntent::Evacuate {
            return Ok(StepResult::echo(weights.keys().cloned()));
        }

        let workload = request.instance_uuid.to_string();
        let rows: Vec<CoverRow> = self
            .store
            .fetch_rows("SELECT workload, host, ready FROM feature_reservation_cover")
            .await?;
        let covering: HashSet<&str> = rows
            .iter()
            .filter(|r| r.workload == workload && r.ready != 0)
            .map(|r| r.host.as_str())
            .collect();

        let mut result = StepResult::new();
        for subject in weights.keys() {
            let activation = if covering.contains(subject.as_str()) {
                self.options.high
            } else {
                self.options.low
            };
            result.activate(subject.clone(), activation);
        }
        Ok(result)
    }
}
