// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Controller
//!
//! Maintains the live cache mapping pipeline key → runnable pipeline for
//! one pipeline kind. Reacts to three event streams:
//!
//! - **Knowledge** transitions recount the readiness of every Step
//!   declaring that Knowledge;
//! - **Step** spec changes recount that Step;
//! - **Pipeline** spec changes re-assemble that pipeline.
//!
//! A changed Step fans out to every Pipeline referencing it; the pipeline
//! count is small, so the controller simply iterates all of them instead
//! of maintaining a reverse index.
//!
//! Assembly walks the Step refs in order: a missing or not-ready mandatory
//! step drops the pipeline from the cache with a status error; not-ready
//! optional steps are skipped silently. The kind-specific
//! [`PipelineFactory`] seam turns the surviving Steps into stages via the
//! registry and applies the wrapper stack (monitoring outermost, then
//! validation).

use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::registry::{StageContext, StageRegistry};
use crate::infrastructure::resources::{ChangeKind, ResourceEvent, ResourceKey, ResourceKind, ResourcePlane};
use crate::infrastructure::stages::monitoring::MonitoredStage;
use crate::infrastructure::store::FeatureStore;
use cortex_bootstrap::CancellationToken;
use cortex_domain::entities::{DecisionKind, Pipeline, PipelineKind, Step};
use cortex_domain::services::{PipelineRequest, SchedulerPipeline, SchedulerStage, ValidatedStage};
use cortex_domain::SchedulerError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// The live pipeline cache shared with the decision controllers.
pub type PipelineCache<R> = Arc<RwLock<HashMap<ResourceKey, Arc<SchedulerPipeline<R>>>>>;

/// The delegation seam: turns an ordered Step list into a runnable
/// pipeline. This is the only kind-specific piece of the controller.
#[async_trait]
pub trait PipelineFactory<R: PipelineRequest>: Send + Sync {
    async fn init_pipeline(&self, pipeline: &Pipeline, steps: &[Step]) -> Result<SchedulerPipeline<R>, SchedulerError>;
}

/// Standard factory: resolve each step in the kind's registry, then wrap
/// with validation (unless disabled) and monitoring, outermost first.
pub struct RegistryPipelineFactory<R: PipelineRequest> {
    registry: Arc<StageRegistry<R>>,
    store: Arc<FeatureStore>,
    metrics: Arc<MetricsService>,
}

impl<R: PipelineRequest> RegistryPipelineFactory<R> {
    pub fn new(registry: Arc<StageRegistry<R>>, store: Arc<FeatureStore>, metrics: Arc<MetricsService>) -> Self {
        Self {
            registry,
            store,
            metrics,
        }
    }
}

#[async_trait]
impl<R: PipelineRequest + 'static> PipelineFactory<R> for RegistryPipelineFactory<R> {
    async fn init_pipeline(&self, pipeline: &Pipeline, steps: &[Step]) -> Result<SchedulerPipeline<R>, SchedulerError> {
        let mut stages: Vec<Arc<dyn SchedulerStage<R>>> = Vec::with_capacity(steps.len());
        for step in steps {
            let context = StageContext::new(Some(self.store.clone()), step.spec.options.clone());
            let mut stage = self.registry.build(&step.spec.implementation, &context)?;
            if !step.spec.validations.disable_validations {
                stage = Arc::new(ValidatedStage::new(stage, step.spec.validations));
            }
            stage = Arc::new(MonitoredStage::new(stage, self.metrics.clone()));
            stages.push(stage);
        }
        Ok(SchedulerPipeline::new(pipeline.meta.name.clone(), stages))
    }
}

/// Keeps step readiness and the live cache of one scheduling kind current.
pub struct PipelineController<R: PipelineRequest> {
    resources: Arc<ResourcePlane>,
    factory: Arc<dyn PipelineFactory<R>>,
    cache: PipelineCache<R>,
    /// The scheduling domain whose filter-weigher pipelines this
    /// controller assembles.
    target: DecisionKind,
    operator: String,
}

impl<R: PipelineRequest + 'static> PipelineController<R> {
    pub fn new(
        resources: Arc<ResourcePlane>,
        factory: Arc<dyn PipelineFactory<R>>,
        target: DecisionKind,
        operator: impl Into<String>,
    ) -> Self {
        Self {
            resources,
            factory,
            cache: Arc::new(RwLock::new(HashMap::new())),
            target,
            operator: operator.into(),
        }
    }

    /// Handle on the live cache, shared with the decision controller.
    pub fn cache(&self) -> PipelineCache<R> {
        self.cache.clone()
    }

    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut events = self.resources.subscribe();
        self.resync_all().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(_)) => self.resync_all().await,
                    Err(RecvError::Closed) => break,
                },
            }
        }
        tracing::info!(target_kind = %self.target, "pipeline controller stopped");
    }

    /// Full recompute: every step, then every pipeline of this kind.
    pub async fn resync_all(&self) {
        for step in self.resources.list_steps() {
            self.recount_step(&step.meta.key()).await;
        }
        for pipeline in self.resources.list_pipelines() {
            self.recompute_pipeline(&pipeline.meta.key()).await;
        }
    }

    async fn handle_event(&self, event: ResourceEvent) {
        match (event.kind, event.change) {
            // Knowledge readiness feeds step readiness; both spec and
            // status transitions matter.
            (ResourceKind::Knowledge, _) => {
                let dependents: Vec<ResourceKey> = self
                    .resources
                    .list_steps()
                    .into_iter()
                    .filter(|s| s.spec.knowledges.iter().any(|k| k.key() == event.key))
                    .map(|s| s.meta.key())
                    .collect();
                for key in dependents {
                    self.recount_step(&key).await;
                }
            }
            // A step's own status writes come from this controller; only
            // spec changes and deletes need a recount.
            (ResourceKind::Step, ChangeKind::Spec) | (ResourceKind::Step, ChangeKind::Deleted) => {
                self.recount_step(&event.key).await;
            }
            (ResourceKind::Pipeline, ChangeKind::Spec) | (ResourceKind::Pipeline, ChangeKind::Deleted) => {
                self.recompute_pipeline(&event.key).await;
            }
            _ => {}
        }
    }

    /// Recounts ready knowledges of one step, then recomputes every
    /// pipeline referencing it.
    async fn recount_step(&self, key: &ResourceKey) {
        if let Some(step) = self.resources.get_step(key) {
            if !step.meta.owned_by(&self.operator) {
                return;
            }
            let total = step.spec.knowledges.len() as u32;
            let ready = step
                .spec
                .knowledges
                .iter()
                .filter(|r| {
                    self.resources
                        .get_knowledge(&r.key())
                        .map(|k| k.is_ready())
                        .unwrap_or(false)
                })
                .count() as u32;
            let is_ready = ready == total;
            if step.status.ready != is_ready || step.status.knowledges_ready != ready {
                self.resources.update_step_status(key, |status| {
                    status.knowledges_total = total;
                    status.knowledges_ready = ready;
                    status.ready = is_ready;
                });
            }
        }

        let affected: Vec<ResourceKey> = self
            .resources
            .list_pipelines()
            .into_iter()
            .filter(|p| p.references_step(key))
            .map(|p| p.meta.key())
            .collect();
        for pipeline_key in affected {
            self.recompute_pipeline(&pipeline_key).await;
        }
    }

    /// Re-assembles one pipeline, or drops it from the cache.
    async fn recompute_pipeline(&self, key: &ResourceKey) {
        let Some(pipeline) = self.resources.get_pipeline(key) else {
            self.cache.write().remove(key);
            return;
        };
        if pipeline.spec.kind != PipelineKind::FilterWeigher
            || pipeline.spec.target != self.target
            || !pipeline.meta.owned_by(&self.operator)
        {
            return;
        }

        let total = pipeline.spec.steps.len() as u32;
        let mut ready = 0u32;
        let mut included: Vec<Step> = Vec::with_capacity(pipeline.spec.steps.len());
        let mut blocked: Option<String> = None;

        for step_ref in pipeline.step_refs() {
            match self.resources.get_step(&step_ref.step.key()) {
                Some(step) if step.is_ready() => {
                    ready += 1;
                    included.push(step);
                }
                missing_or_not_ready => {
                    let why = if missing_or_not_ready.is_none() { "missing" } else { "not ready" };
                    if step_ref.mandatory {
                        blocked.get_or_insert(format!("mandatory step {} is {}", step_ref.step, why));
                    } else {
                        tracing::debug!(pipeline = %pipeline.meta.name, step = %step_ref.step, "dropping optional step: {why}");
                    }
                }
            }
        }

        if let Some(reason) = blocked {
            self.cache.write().remove(key);
            self.resources.update_pipeline_status(key, |status| {
                status.steps_total = total;
                status.steps_ready = ready;
                status.ready = false;
                status.error = reason;
            });
            return;
        }

        match self.factory.init_pipeline(&pipeline, &included).await {
            Ok(assembled) => {
                tracing::info!(pipeline = %pipeline.meta.name, stages = included.len(), "pipeline (re)assembled");
                self.cache.write().insert(key.clone(), Arc::new(assembled));
                self.resources.update_pipeline_status(key, |status| {
                    status.steps_total = total;
                    status.steps_ready = ready;
                    status.ready = true;
                    status.error = String::new();
                });
            }
            Err(e) => {
                tracing::warn!(pipeline = %pipeline.meta.name, error = %e, "pipeline assembly failed");
                self.cache.write().remove(key);
                self.resources.update_pipeline_status(key, |status| {
                    status.steps_total = total;
                    status.steps_ready = ready;
                    status.ready = false;
                    status.error = e.to_string();
                });
            }
        }
    }
}
