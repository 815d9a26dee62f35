// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Decision Controller
//!
//! One instance per pipeline kind. For each fresh Decision of its kind it
//! resolves the referenced pipeline from the live cache, deserialises the
//! raw payload into the kind's request type, runs the pipeline, and writes
//! the ranked result (or the error) into the record's status.
//!
//! A Decision whose pipeline is not cached yet is left untouched; a later
//! pipeline event or the periodic retry tick picks it up. Pipeline errors
//! land in the record's status and never escape the loop; a terminal
//! record (error or result present) is never reprocessed.

use crate::application::controllers::pipeline::PipelineCache;
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::resources::{ChangeKind, ResourceEvent, ResourceKey, ResourceKind, ResourcePlane};
use cortex_bootstrap::CancellationToken;
use cortex_domain::entities::{DecisionKind, DecisionResult, StepActivationRecord};
use cortex_domain::services::PipelineRequest;
use cortex_domain::Subject;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

/// Processes Decisions of one kind against the kind's pipeline cache.
pub struct DecisionController<R: PipelineRequest + DeserializeOwned> {
    resources: Arc<ResourcePlane>,
    cache: PipelineCache<R>,
    kind: DecisionKind,
    operator: String,
    metrics: Arc<MetricsService>,
    retry: Duration,
}

impl<R: PipelineRequest + DeserializeOwned + 'static> DecisionController<R> {
    pub fn new(
        resources: Arc<ResourcePlane>,
        cache: PipelineCache<R>,
        kind: DecisionKind,
        operator: impl Into<String>,
        metrics: Arc<MetricsService>,
        retry: Duration,
    ) -> Self {
        Self {
            resources,
            cache,
            kind,
            operator: operator.into(),
            metrics,
            retry,
        }
    }

    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut events = self.resources.subscribe();
        let mut retry = tokio::time::interval(self.retry);
        retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        self.reconcile_pending().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(_)) => self.reconcile_pending().await,
                    Err(RecvError::Closed) => break,
                },
                _ = retry.tick() => self.reconcile_pending().await,
            }
        }
        tracing::info!(kind = %self.kind, "decision controller stopped");
    }

    async fn handle_event(&self, event: ResourceEvent) {
        match (event.kind, event.change) {
            (ResourceKind::Decision, ChangeKind::Spec) => self.reconcile(&event.key).await,
            // A pipeline transition may unblock decisions that were waiting
            // for their pipeline to appear in the cache.
            (ResourceKind::Pipeline, ChangeKind::Status) => self.reconcile_pending().await,
            _ => {}
        }
    }

    /// One pass over every non-terminal decision of this kind.
    pub async fn reconcile_pending(&self) {
        let pending: Vec<ResourceKey> = self
            .resources
            .list_decisions()
            .into_iter()
            .filter(|d| d.spec.kind == self.kind && !d.is_terminal())
            .map(|d| d.meta.key())
            .collect();
        for key in pending {
            self.reconcile(&key).await;
        }
    }

    async fn reconcile(&self, key: &ResourceKey) {
        let Some(decision) = self.resources.get_decision(key) else {
            return;
        };
        if decision.spec.kind != self.kind || !decision.meta.owned_by(&self.operator) || decision.is_terminal() {
            return;
        }

        let Some(pipeline) = self.cache.read().get(&decision.spec.pipeline.key()).cloned() else {
            tracing::debug!(
                decision = %decision.meta.name,
                pipeline = %decision.spec.pipeline,
                "pipeline not in cache yet, leaving decision for retry"
            );
            return;
        };

        let started = Instant::now();
        let request: R = match serde_json::from_value(decision.spec.payload.clone()) {
            Ok(request) => request,
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.resources.update_decision_status(key, |status| {
                    status.record_error(format!("Data integrity error: bad request payload: {e}"), duration_ms);
                });
                self.metrics
                    .observe_decision(&self.kind.to_string(), "invalid", started.elapsed().as_secs_f64());
                return;
            }
        };

        match pipeline.run(&request).await {
            Ok(outcome) => {
                // Defensive filter: the response never names hosts outside
                // the request's own candidate list.
                let candidates: HashSet<Subject> = request.subjects().into_iter().collect();
                let hosts: Vec<Subject> = outcome
                    .ranked
                    .into_iter()
                    .filter(|s| candidates.contains(s))
                    .collect();
                let result = DecisionResult {
                    weights: outcome
                        .weights
                        .into_iter()
                        .filter(|(s, _)| candidates.contains(s))
                        .collect(),
                    step_activations: outcome
                        .steps
                        .into_iter()
                        .map(|s| StepActivationRecord {
                            step: s.step,
                            activations: s.activations,
                        })
                        .collect(),
                    hosts,
                };
                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    decision = %decision.meta.name,
                    target = ?result.hosts.first(),
                    hosts = result.hosts.len(),
                    duration_ms,
                    "decision ranked"
                );
                self.resources
                    .update_decision_status(key, |status| status.record_result(result, duration_ms));
                self.metrics
                    .observe_decision(&self.kind.to_string(), "success", started.elapsed().as_secs_f64());
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(decision = %decision.meta.name, error = %e, "pipeline run failed");
                self.resources
                    .update_decision_status(key, |status| status.record_error(e.to_string(), duration_ms));
                self.metrics
                    .observe_decision(&self.kind.to_string(), "error", started.elapsed().as_secs_f64());
            }
        }
    }
}
