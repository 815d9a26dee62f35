// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Datasource Controller
//!
//! Drives the syncers: on every tick, each datasource record that is due
//! gets its syncer run, and the outcome lands in the record's status.
//! Waiting and retryable failures reschedule with the configured backoff;
//! terminal configuration failures park the record until its spec changes.

use crate::infrastructure::resources::{ChangeKind, ResourceEvent, ResourceKey, ResourceKind, ResourcePlane};
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::syncers::base::Syncer;
use crate::infrastructure::syncers::{syncer_for, SyncerDeps};
use cortex_bootstrap::CancellationToken;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

/// How much longer than its interval a record waits after a terminal
/// configuration failure. Spec edits clear it immediately.
const TERMINAL_BACKOFF_FACTOR: i64 = 10;

/// Reconciles Datasource records by running their syncers.
pub struct DatasourceController {
    resources: Arc<ResourcePlane>,
    deps: SyncerDeps,
    metrics: Arc<MetricsService>,
    operator: String,
    tick: Duration,
    backoff: Duration,
}

impl DatasourceController {
    pub fn new(
        resources: Arc<ResourcePlane>,
        deps: SyncerDeps,
        metrics: Arc<MetricsService>,
        operator: impl Into<String>,
        tick: Duration,
        backoff: Duration,
    ) -> Self {
        Self {
            resources,
            deps,
            metrics,
            operator: operator.into(),
            tick,
            backoff,
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
                    // A spec edit reconciles immediately, clearing any
                    // terminal parking.
                    Ok(ResourceEvent { kind: ResourceKind::Datasource, key, change: ChangeKind::Spec }) => {
                        self.reconcile(&key, &token).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                _ = tick.tick() => self.reconcile_due(&token).await,
            }
        }
        tracing::info!("datasource controller stopped");
    }

    pub async fn reconcile_due(&self, token: &CancellationToken) {
        let now = Utc::now();
        let due: Vec<ResourceKey> = self
            .resources
            .list_datasources()
            .into_iter()
            .filter(|ds| ds.meta.owned_by(&self.operator) && ds.is_due(now))
            .map(|ds| ds.meta.key())
            .collect();
        for key in due {
            if token.is_cancelled() {
                return;
            }
            self.reconcile(&key, token).await;
        }
    }

    async fn reconcile(&self, key: &ResourceKey, token: &CancellationToken) {
        let Some(datasource) = self.resources.get_datasource(key) else {
            return;
        };
        if !datasource.meta.owned_by(&self.operator) {
            return;
        }

        let syncer = syncer_for(datasource.spec.kind, &self.deps);
        if let Err(e) = syncer.init().await {
            tracing::warn!(datasource = %datasource.meta.name, error = %e, "syncer init failed");
            self.resources.update_datasource_status(key, |status| {
                status.error = e.to_string();
                status.next_due = Some(Utc::now() + chrono_backoff(self.backoff));
            });
            return;
        }

        let interval = ChronoDuration::seconds(datasource.spec.sync_interval_secs as i64);
        let started = Instant::now();
        match syncer.sync(token).await {
            Ok(count) => {
                let elapsed = started.elapsed();
                tracing::info!(datasource = %datasource.meta.name, objects = count, "sync complete");
                self.metrics
                    .observe_sync(syncer.name(), count, elapsed.as_secs_f64());
                let now = Utc::now();
                self.resources.update_datasource_status(key, |status| {
                    status.last_synced = Some(now);
                    status.next_due = Some(now + interval);
                    status.object_count = count as u64;
                    status.last_duration_ms = elapsed.as_millis() as u64;
                    status.error = String::new();
                });
            }
            Err(e) => {
                let requeue_after = if e.is_waiting() || e.is_retryable() {
                    chrono_backoff(self.backoff)
                } else {
                    // Terminal until the record changes; a spec event
                    // reconciles immediately.
                    interval * TERMINAL_BACKOFF_FACTOR as i32
                };
                tracing::warn!(datasource = %datasource.meta.name, error = %e, "sync failed");
                self.resources.update_datasource_status(key, |status| {
                    status.error = e.to_string();
                    status.next_due = Some(Utc::now() + requeue_after);
                });
            }
        }
    }
}

fn chrono_backoff(backoff: Duration) -> ChronoDuration {
    ChronoDuration::seconds(backoff.as_secs() as i64)
}
