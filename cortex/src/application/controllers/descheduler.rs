// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Descheduler Reconciler and Executor
//!
//! The reconciler runs descheduler pipelines on its own schedule: every
//! ready descheduler Pipeline has its stages run against the store, and
//! each returned recommendation is upserted as one Descheduling record
//! keyed by workload + host.
//!
//! The executor watches Deschedulings and hands them to the external
//! actuator. With dry-run enabled (the default) the actuator call is
//! skipped and the record stays unissued. A record is never issued twice;
//! once the workload has left the expected host (or vanished entirely) the
//! record is deleted.

use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::registry::{DeschedulerRegistry, StageContext};
use crate::infrastructure::resources::{ChangeKind, ResourceEvent, ResourceKind, ResourcePlane};
use crate::infrastructure::store::FeatureStore;
use cortex_bootstrap::CancellationToken;
use cortex_domain::entities::{Descheduling, DeschedulingSpec, Pipeline, PipelineKind, ResourceMeta};
use cortex_domain::services::{DeschedulerStage, MigrationRecommendation, RunTrace};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Port to the external migration actuator.
#[async_trait]
pub trait MigrationActuator: Send + Sync {
    async fn live_migrate(&self, workload: &str, source_host: &str) -> Result<(), SchedulerError>;
}

/// Actuator that only logs; the wiring default alongside dry-run.
pub struct LoggingActuator;

#[async_trait]
impl MigrationActuator for LoggingActuator {
    async fn live_migrate(&self, workload: &str, source_host: &str) -> Result<(), SchedulerError> {
        tracing::info!(%workload, %source_host, "live-migrate requested");
        Ok(())
    }
}

/// Runs descheduler pipelines and upserts their recommendations.
pub struct DeschedulerController {
    resources: Arc<ResourcePlane>,
    registry: Arc<DeschedulerRegistry>,
    store: Arc<FeatureStore>,
    metrics: Arc<MetricsService>,
    operator: String,
    interval: Duration,
}

impl DeschedulerController {
    pub fn new(
        resources: Arc<ResourcePlane>,
        registry: Arc<DeschedulerRegistry>,
        store: Arc<FeatureStore>,
        metrics: Arc<MetricsService>,
        operator: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            resources,
            registry,
            store,
            metrics,
            operator: operator.into(),
            interval,
        }
    }

    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => self.run_pipelines().await,
            }
        }
        tracing::info!("descheduler controller stopped");
    }

    pub async fn run_pipelines(&self) {
        for pipeline in self.resources.list_pipelines() {
            if pipeline.spec.kind != PipelineKind::Descheduler || !pipeline.meta.owned_by(&self.operator) {
                continue;
            }
            match self.run_pipeline(&pipeline).await {
                Ok(recommendations) => {
                    for recommendation in recommendations {
                        self.upsert(&pipeline, recommendation);
                    }
                }
                Err(e) => {
                    tracing::warn!(pipeline = %pipeline.meta.name, error = %e, "descheduler pipeline failed");
                    self.resources
                        .update_pipeline_status(&pipeline.meta.key(), |status| status.error = e.to_string());
                }
            }
        }
    }

    /// Assembles and runs one descheduler pipeline. Mandatory steps gate
    /// the run exactly like the filter-weigher assembly does.
    async fn run_pipeline(&self, pipeline: &Pipeline) -> Result<Vec<MigrationRecommendation>, SchedulerError> {
        let trace = RunTrace::new(pipeline.meta.name.clone(), vec![]);
        let mut recommendations = Vec::new();
        for step_ref in pipeline.step_refs() {
            let step = match self.resources.get_step(&step_ref.step.key()) {
                Some(step) if step.is_ready() => step,
                _ if step_ref.mandatory => {
                    return Err(SchedulerError::waiting_for(format!(
                        "mandatory step {} is not ready",
                        step_ref.step
                    )))
                }
                _ => continue,
            };
            let context = StageContext::new(Some(self.store.clone()), step.spec.options.clone());
            let stage = self.registry.build(&step.spec.implementation, &context)?;
            recommendations.extend(stage.run(&trace).await?);
        }
        Ok(recommendations)
    }

    /// One Descheduling per (workload, host); never touches issued records.
    fn upsert(&self, pipeline: &Pipeline, recommendation: MigrationRecommendation) {
        let name = Descheduling::record_name(&recommendation.workload, &recommendation.host);
        let key = (pipeline.meta.namespace.clone(), name.clone());
        if let Some(existing) = self.resources.get_descheduling(&key) {
            if existing.is_issued() || existing.spec.reason == recommendation.reason {
                return;
            }
        }
        tracing::info!(
            workload = %recommendation.workload,
            host = %recommendation.host,
            reason = %recommendation.reason,
            "recommending descheduling"
        );
        self.metrics.observe_descheduling();
        self.resources.apply_descheduling(Descheduling {
            meta: ResourceMeta::new(name, &pipeline.meta.namespace, &self.operator),
            spec: DeschedulingSpec {
                workload: recommendation.workload,
                host: recommendation.host,
                reason: recommendation.reason,
            },
            status: Default::default(),
        });
    }
}

/// Hands Deschedulings to the actuator and tracks their lifecycle.
pub struct DeschedulingExecutor {
    resources: Arc<ResourcePlane>,
    store: Arc<FeatureStore>,
    actuator: Arc<dyn MigrationActuator>,
    operator: String,
    dry_run: bool,
    tick: Duration,
}

impl DeschedulingExecutor {
    pub fn new(
        resources: Arc<ResourcePlane>,
        store: Arc<FeatureStore>,
        actuator: Arc<dyn MigrationActuator>,
        operator: impl Into<String>,
        dry_run: bool,
        tick: Duration,
    ) -> Self {
        Self {
            resources,
            store,
            actuator,
            operator: operator.into(),
            dry_run,
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
                    Ok(ResourceEvent { kind: ResourceKind::Descheduling, change: ChangeKind::Spec, .. }) => {
                        self.reconcile_all().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => self.reconcile_all().await,
                    Err(RecvError::Closed) => break,
                },
                _ = tick.tick() => self.reconcile_all().await,
            }
        }
        tracing::info!("descheduling executor stopped");
    }

    pub async fn reconcile_all(&self) {
        for descheduling in self.resources.list_deschedulings() {
            if !descheduling.meta.owned_by(&self.operator) {
                continue;
            }
            self.reconcile(&descheduling).await;
        }
    }

    async fn reconcile(&self, descheduling: &Descheduling) {
        let key = descheduling.meta.key();

        // Gone-check: the workload left the host or disappeared entirely.
        match self.workload_host(&descheduling.spec.workload).await {
            Ok(host) if host.as_deref() != Some(descheduling.spec.host.as_str()) => {
                tracing::info!(
                    workload = %descheduling.spec.workload,
                    "workload no longer on expected host, deleting descheduling"
                );
                self.resources.delete_descheduling(&key);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "gone-check failed, retrying later");
                return;
            }
        }

        // Never issue twice, and never issue in dry-run.
        if descheduling.is_issued() || self.dry_run {
            return;
        }

        self.resources.update_descheduling_status(&key, |status| status.in_progress = true);
        match self
            .actuator
            .live_migrate(&descheduling.spec.workload, &descheduling.spec.host)
            .await
        {
            Ok(()) => {
                self.resources.update_descheduling_status(&key, |status| {
                    status.in_progress = false;
                    status.ready = true;
                    status.error = String::new();
                });
            }
            Err(e) => {
                tracing::warn!(workload = %descheduling.spec.workload, error = %e, "live-migrate failed");
                // The migration was issued; `in_progress` stays set so it is
                // never handed to the actuator a second time. Error is a
                // terminal outcome, operator delete clears the record.
                self.resources
                    .update_descheduling_status(&key, |status| status.error = e.to_string());
            }
        }
    }

    async fn workload_host(&self, workload: &str) -> Result<Option<String>, SchedulerError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT host FROM servers WHERE uuid = ?")
            .bind(workload)
            .fetch_optional(self.store.pool())
            .await
            .map_err(|e| SchedulerError::store_error(e.to_string()))?;
        Ok(row.map(|(host,)| host))
    }
}
