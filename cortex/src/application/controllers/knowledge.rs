// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Knowledge Controller
//!
//! Reconciles Knowledge records: a record is worked when its recency
//! window has expired (periodic tick) or when the trigger controller fans
//! an upstream change in through the requeue channel.
//!
//! Gating comes first, extraction second:
//!
//! 1. Every upstream Datasource and Knowledge must exist and be ready;
//!    otherwise the record waits; the extractor is never invoked in that
//!    pass.
//! 2. All upstreams must share the record's logical store identity; a
//!    violation is terminal until the operator edits the record.
//! 3. Only then does the extractor run, and its feature list lands in the
//!    record's status.

use crate::infrastructure::extractors::base::{ExtractorContext, FeatureExtractor};
use crate::infrastructure::extractors::ExtractorRegistry;
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::resources::{ResourceKey, ResourcePlane};
use crate::infrastructure::store::FeatureStore;
use cortex_bootstrap::CancellationToken;
use cortex_domain::entities::Knowledge;
use cortex_domain::SchedulerError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the upstream gate decided about one Knowledge.
enum Gate {
    /// All upstreams ready, extraction may proceed.
    Clear,
    /// Waiting on an upstream; requeued by the trigger controller.
    Waiting(String),
    /// Terminal until the operator edits the record.
    Terminal(String),
}

/// Reconciles Knowledge records against the extractor registry.
pub struct KnowledgeController {
    resources: Arc<ResourcePlane>,
    store: Arc<FeatureStore>,
    registry: Arc<ExtractorRegistry>,
    metrics: Arc<MetricsService>,
    operator: String,
    tick: Duration,
}

impl KnowledgeController {
    pub fn new(
        resources: Arc<ResourcePlane>,
        store: Arc<FeatureStore>,
        registry: Arc<ExtractorRegistry>,
        metrics: Arc<MetricsService>,
        operator: impl Into<String>,
        tick: Duration,
    ) -> Self {
        Self {
            resources,
            store,
            registry,
            metrics,
            operator: operator.into(),
            tick,
        }
    }

    /// Runs the loop; `triggers` carries keys requeued by the trigger
    /// controller.
    pub async fn run(self: Arc<Self>, token: CancellationToken, mut triggers: mpsc::Receiver<ResourceKey>) {
        let mut tick = tokio::time::interval(self.tick);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                triggered = triggers.recv() => match triggered {
                    Some(key) => self.reconcile(&key).await,
                    None => break,
                },
                _ = tick.tick() => self.reconcile_due().await,
            }
        }
        tracing::info!("knowledge controller stopped");
    }

    async fn reconcile_due(&self) {
        let now = Utc::now();
        let due: Vec<ResourceKey> = self
            .resources
            .list_knowledges()
            .into_iter()
            .filter(|k| k.meta.owned_by(&self.operator) && k.is_due(now))
            .map(|k| k.meta.key())
            .collect();
        for key in due {
            self.reconcile(&key).await;
        }
    }

    pub async fn reconcile(&self, key: &ResourceKey) {
        let Some(knowledge) = self.resources.get_knowledge(key) else {
            return;
        };
        if !knowledge.meta.owned_by(&self.operator) {
            return;
        }

        match self.gate(&knowledge) {
            Gate::Terminal(reason) => {
                tracing::warn!(knowledge = %knowledge.meta.name, %reason, "knowledge terminally misconfigured");
                // Unchanged status text is not re-written: every status
                // write re-triggers the dependents.
                if knowledge.status.error != reason {
                    self.resources.update_knowledge_status(key, |status| status.error = reason);
                }
                return;
            }
            Gate::Waiting(reason) => {
                tracing::debug!(knowledge = %knowledge.meta.name, %reason, "knowledge waiting for upstream");
                if knowledge.status.error != reason {
                    self.resources.update_knowledge_status(key, |status| status.error = reason);
                }
                return;
            }
            Gate::Clear => {}
        }

        match self.extract(&knowledge).await {
            Ok(features) => {
                let count = features.len();
                tracing::info!(knowledge = %knowledge.meta.name, features = count, "extraction complete");
                self.metrics.observe_extraction(&knowledge.meta.name, count);
                let now = Utc::now();
                self.resources.update_knowledge_status(key, |status| {
                    status.last_extracted = Some(now);
                    status.feature_count = count as u64;
                    status.features = Some(serde_json::Value::Array(features));
                    status.error = String::new();
                });
            }
            Err(e) => {
                tracing::warn!(knowledge = %knowledge.meta.name, error = %e, "extraction failed");
                self.resources.update_knowledge_status(key, |status| status.error = e.to_string());
            }
        }
    }

    /// Checks upstream readiness and the single-store invariant.
    fn gate(&self, knowledge: &Knowledge) -> Gate {
        for dref in &knowledge.spec.datasources {
            match self.resources.get_datasource(&dref.key()) {
                None => return Gate::Waiting(format!("Dependency not ready: datasource {dref} does not exist")),
                Some(ds) if ds.spec.store != knowledge.spec.store => {
                    return Gate::Terminal(format!(
                        "Invalid configuration: datasource {dref} lives in store {}, knowledge expects {}",
                        ds.spec.store, knowledge.spec.store
                    ))
                }
                Some(ds) if !ds.is_ready() => {
                    return Gate::Waiting(format!("Dependency not ready: datasource {dref} is not ready"))
                }
                Some(_) => {}
            }
        }
        for kref in &knowledge.spec.knowledges {
            match self.resources.get_knowledge(&kref.key()) {
                None => return Gate::Waiting(format!("Dependency not ready: knowledge {kref} does not exist")),
                Some(up) if up.spec.store != knowledge.spec.store => {
                    return Gate::Terminal(format!(
                        "Invalid configuration: knowledge {kref} lives in store {}, knowledge expects {}",
                        up.spec.store, knowledge.spec.store
                    ))
                }
                Some(up) if !up.is_ready() => {
                    return Gate::Waiting(format!("Dependency not ready: knowledge {kref} is not ready"))
                }
                Some(_) => {}
            }
        }
        Gate::Clear
    }

    async fn extract(&self, knowledge: &Knowledge) -> Result<Vec<serde_json::Value>, SchedulerError> {
        let context = ExtractorContext::new(Some(self.store.clone()), knowledge.spec.options.clone());
        let extractor = self.registry.build(&knowledge.spec.extractor, &context)?;
        extractor.extract().await
    }
}
