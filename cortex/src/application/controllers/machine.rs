// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Machine Controller
//!
//! Bare-machine scheduling is not request-driven: nobody posts a Decision
//! for a new Machine. This controller closes the gap in both directions:
//!
//! - Machines lacking a pool reference get a Decision synthesised on their
//!   behalf, pointed at the default machine pipeline, with every known
//!   machine pool as the candidate set.
//! - Ranked BareMachine Decisions get their winner written back onto the
//!   Machine's `pool_ref`; Decisions for vanished Machines are deleted.

use crate::infrastructure::resources::{ChangeKind, ResourceEvent, ResourceKind, ResourcePlane};
use crate::infrastructure::store::FeatureStore;
use cortex_bootstrap::CancellationToken;
use cortex_domain::entities::{BareMachineRequest, Decision, DecisionKind, DecisionSpec, Machine, ResourceMeta};
use cortex_domain::{ResourceRef, SchedulerError, Subject};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Synthesises Decisions for unplaced Machines and applies the results.
pub struct MachineController {
    resources: Arc<ResourcePlane>,
    store: Arc<FeatureStore>,
    operator: String,
    default_pipeline: String,
    pipeline_namespace: String,
    tick: Duration,
}

impl MachineController {
    pub fn new(
        resources: Arc<ResourcePlane>,
        store: Arc<FeatureStore>,
        operator: impl Into<String>,
        default_pipeline: impl Into<String>,
        pipeline_namespace: impl Into<String>,
        tick: Duration,
    ) -> Self {
        Self {
            resources,
            store,
            operator: operator.into(),
            default_pipeline: default_pipeline.into(),
            pipeline_namespace: pipeline_namespace.into(),
            tick,
        }
    }

    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut events = self.resources.subscribe();
        let mut tick = tokio::time::interval(self.tick);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(_)) => self.reconcile_all().await,
                    Err(RecvError::Closed) => break,
                },
                _ = tick.tick() => self.reconcile_all().await,
            }
        }
        tracing::info!("machine controller stopped");
    }

    async fn handle_event(&self, event: ResourceEvent) {
        match (event.kind, event.change) {
            (ResourceKind::Machine, ChangeKind::Spec) => self.reconcile_all().await,
            (ResourceKind::Machine, ChangeKind::Deleted) => self.collect_garbage().await,
            (ResourceKind::Decision, ChangeKind::Status) => self.apply_results().await,
            _ => {}
        }
    }

    pub async fn reconcile_all(&self) {
        self.synthesise_decisions().await;
        self.apply_results().await;
        self.collect_garbage().await;
    }

    /// Creates a Decision for every unplaced Machine that has none yet.
    async fn synthesise_decisions(&self) {
        for machine in self.resources.list_machines() {
            if !machine.meta.owned_by(&self.operator) || !machine.needs_placement() {
                continue;
            }
            let key = machine.meta.key();
            if self.resources.get_decision(&key).is_some() {
                continue;
            }
            match self.build_decision(&machine).await {
                Ok(decision) => {
                    tracing::info!(machine = %machine.meta.name, "synthesising bare-machine decision");
                    self.resources.apply_decision(decision);
                }
                Err(e) if e.is_waiting() => {
                    tracing::debug!(machine = %machine.meta.name, error = %e, "deferring decision synthesis");
                }
                Err(e) => {
                    tracing::warn!(machine = %machine.meta.name, error = %e, "cannot synthesise decision");
                }
            }
        }
    }

    async fn build_decision(&self, machine: &Machine) -> Result<Decision, SchedulerError> {
        #[derive(sqlx::FromRow)]
        struct PoolName {
            name: String,
        }
        let pools: Vec<PoolName> = self.store.fetch_rows("SELECT name FROM machine_pools").await?;
        if pools.is_empty() {
            // A decision over zero candidates would go terminal with no
            // placement; wait for the pool mirror instead.
            return Err(SchedulerError::waiting_for("machine pools not yet synced"));
        }
        let request = BareMachineRequest {
            machine: machine.meta.name.clone(),
            size: machine.spec.size.clone(),
            pools: pools.into_iter().map(|p| Subject::new(p.name)).collect(),
            weights: HashMap::new(),
        };
        Ok(Decision {
            meta: ResourceMeta::new(&machine.meta.name, &machine.meta.namespace, &self.operator),
            spec: DecisionSpec {
                kind: DecisionKind::BareMachine,
                pipeline: ResourceRef::new(&self.default_pipeline, &self.pipeline_namespace),
                resource_id: machine.meta.name.clone(),
                source_host: None,
                prior_decisions: vec![],
                payload: serde_json::to_value(&request)?,
            },
            status: Default::default(),
        })
    }

    /// Writes ranked pools back onto their Machines.
    async fn apply_results(&self) {
        for decision in self.resources.list_decisions() {
            if decision.spec.kind != DecisionKind::BareMachine || !decision.meta.owned_by(&self.operator) {
                continue;
            }
            let Some(target) = decision.status.target_host.clone() else {
                continue;
            };
            let machine_key = (decision.meta.namespace.clone(), decision.spec.resource_id.clone());
            let Some(mut machine) = self.resources.get_machine(&machine_key) else {
                continue;
            };
            if machine.needs_placement() {
                tracing::info!(machine = %machine.meta.name, pool = %target, "placing machine");
                machine.spec.pool_ref = Some(target.as_str().to_string());
                self.resources.apply_machine(machine);
            }
        }
    }

    /// Deletes Decisions whose Machine no longer exists.
    async fn collect_garbage(&self) {
        for decision in self.resources.list_decisions() {
            if decision.spec.kind != DecisionKind::BareMachine || !decision.meta.owned_by(&self.operator) {
                continue;
            }
            let machine_key = (decision.meta.namespace.clone(), decision.spec.resource_id.clone());
            if self.resources.get_machine(&machine_key).is_none() {
                tracing::info!(decision = %decision.meta.name, "deleting decision for vanished machine");
                self.resources.delete_decision(&decision.meta.key());
            }
        }
    }
}
